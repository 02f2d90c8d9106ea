//! Owns every component and wires the flows between them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use super::{
	BuildSupervisor, CameraCommand, ConnectionSuggestionEngine, FetchOutcome, GraphCatalog,
	GraphDataCache, NodeDetails, SearchHit, SelectionFocusController, report,
};
use crate::api::GraphApi;
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::events::{BuildPhase, EventBus, Subscription, WorkspaceEvent};
use crate::model::{
	BuildRequest, ConnectionSuggestion, DocumentRef, Graph, GraphConfig, GraphData, GraphId,
	GraphStatus,
};
use crate::scheduler::{CancelToken, PollHandle, Scheduler};

/// The engine as one owned state container.
///
/// Components publish on a shared [`EventBus`]; the workspace subscribes to
/// it to run the cross-component reactions (clear on deselect, reload after a
/// build, revalidate focus after a reload) and the UI subscribes to mirror
/// state into its own signals.
pub struct Workspace {
	config: EngineConfig,
	bus: Rc<EventBus<WorkspaceEvent>>,
	scheduler: Rc<dyn Scheduler>,
	api: Rc<dyn GraphApi>,
	catalog: Rc<GraphCatalog>,
	builds: Rc<BuildSupervisor>,
	cache: Rc<GraphDataCache>,
	selection: Rc<SelectionFocusController>,
	suggestions: Rc<ConnectionSuggestionEngine>,
	shutdown: CancelToken,
	job_watch: RefCell<Option<PollHandle>>,
	reactions: RefCell<Option<Subscription>>,
}

impl Workspace {
	/// Assemble the engine around a backend and a scheduler.
	pub fn new(config: EngineConfig, api: Rc<dyn GraphApi>, scheduler: Rc<dyn Scheduler>) -> Rc<Self> {
		let bus = EventBus::new();
		let shutdown = CancelToken::new();
		let catalog = Rc::new(GraphCatalog::new(
			api.clone(),
			scheduler.clone(),
			bus.clone(),
			config.throttle.catalog_refresh_ms,
		));
		let builds = BuildSupervisor::new(
			api.clone(),
			scheduler.clone(),
			bus.clone(),
			catalog.clone(),
			config.polling.clone(),
			shutdown.clone(),
		);
		let cache = Rc::new(GraphDataCache::new(
			api.clone(),
			scheduler.clone(),
			bus.clone(),
			config.throttle.data_refetch_ms,
		));
		let selection = Rc::new(SelectionFocusController::new(
			bus.clone(),
			config.render.focus_zoom,
		));
		let suggestions = Rc::new(ConnectionSuggestionEngine::new(
			api.clone(),
			bus.clone(),
			config.suggestion_max_links,
		));

		let workspace = Rc::new(Self {
			config,
			bus,
			scheduler,
			api,
			catalog,
			builds,
			cache,
			selection,
			suggestions,
			shutdown,
			job_watch: RefCell::new(None),
			reactions: RefCell::new(None),
		});

		let weak = Rc::downgrade(&workspace);
		let subscription = workspace.bus.subscribe(move |event| {
			if let Some(ws) = weak.upgrade() {
				ws.react(event);
			}
		});
		*workspace.reactions.borrow_mut() = Some(subscription);
		workspace
	}

	/// Configuration the engine runs with.
	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Event stream for observers.
	pub fn bus(&self) -> &Rc<EventBus<WorkspaceEvent>> {
		&self.bus
	}

	/// Graph list and selection.
	pub fn catalog(&self) -> &Rc<GraphCatalog> {
		&self.catalog
	}

	/// Build trigger and polling.
	pub fn builds(&self) -> &Rc<BuildSupervisor> {
		&self.builds
	}

	/// Data of the selected graph.
	pub fn cache(&self) -> &Rc<GraphDataCache> {
		&self.cache
	}

	/// Focused node.
	pub fn selection(&self) -> &Rc<SelectionFocusController> {
		&self.selection
	}

	/// Suggestion session.
	pub fn suggestions(&self) -> &Rc<ConnectionSuggestionEngine> {
		&self.suggestions
	}

	/// Token cancelled by [`Workspace::shutdown`]; every background task checks it.
	pub fn shutdown_token(&self) -> CancelToken {
		self.shutdown.clone()
	}

	/// List graphs, resume polling of running builds and start the job cross-check.
	pub async fn start(self: &Rc<Self>) -> Result<()> {
		self.catalog.list().await?;
		self.watch_building();
		self.start_job_watch();
		Ok(())
	}

	/// Cancel every poller and background task.
	pub fn shutdown(&self) {
		info!("workspace shutting down");
		self.shutdown.cancel();
		self.builds.stop_all();
		self.job_watch.borrow_mut().take();
	}

	/// Select a graph, or clear the selection.
	pub fn select_graph(&self, id: Option<GraphId>) -> bool {
		self.catalog.select(id)
	}

	/// Create a graph; it becomes the selected one.
	pub async fn create_graph(&self, config: &GraphConfig) -> Result<Graph> {
		self.catalog.create(config).await
	}

	/// Update a graph; it becomes the selected one.
	pub async fn update_graph(&self, id: &GraphId, config: &GraphConfig) -> Result<Graph> {
		self.catalog.update(id, config).await
	}

	/// Delete a graph.
	pub async fn delete_graph(&self, id: &GraphId) -> Result<()> {
		self.catalog.delete(id).await
	}

	/// Build a graph and poll it to completion.
	pub async fn trigger_build(&self, id: &GraphId, request: &BuildRequest) -> Result<()> {
		self.builds.trigger_build(id, request).await
	}

	/// Documents that can be attached to a graph.
	pub async fn list_documents(&self) -> Result<Vec<DocumentRef>> {
		self.api
			.list_documents()
			.await
			.map_err(|e| report(&self.bus, e))
	}

	/// Reload the selected graph's data.
	pub async fn reload(&self, force: bool) -> Result<FetchOutcome> {
		self.cache.refetch(force).await
	}

	/// Toggle cross-graph links in the rendered data and reload.
	pub fn set_cross_links(self: &Rc<Self>, include: bool, target: Option<GraphId>) {
		self.cache.set_cross_links(include, target);
		self.spawn_reload(false);
	}

	/// Data currently rendered.
	pub fn data(&self) -> Arc<GraphData> {
		self.cache.data()
	}

	/// Focus a node after a click or search pick.
	pub fn focus_node(&self, id: &str) -> Option<CameraCommand> {
		self.selection.focus_node(id, &self.cache.data())
	}

	/// Clear the focus.
	pub fn deselect_node(&self) {
		self.selection.deselect();
	}

	/// Search node names in the rendered data.
	pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
		self.selection.search(query, &self.cache.data(), limit)
	}

	/// Details of the focused node.
	pub fn node_details(&self) -> Option<NodeDetails> {
		self.selection.details(&self.cache.data())
	}

	/// Suggest links from the selected graph to `target`.
	pub async fn suggest(&self, target: Option<&GraphId>, context: &str) -> Result<Vec<ConnectionSuggestion>> {
		let Some(source) = self.catalog.selected() else {
			return Err(report(&self.bus, GraphError::validation("Select a graph first")));
		};
		self.suggestions.suggest(&source, target, context).await
	}

	/// Persist the checked suggestions.
	pub async fn save_suggestions(&self) -> Result<usize> {
		self.suggestions.save_selected().await
	}

	/// Poll every graph the catalog reports as building.
	pub fn watch_building(&self) {
		for graph in self.catalog.graphs() {
			if graph.status == GraphStatus::Building {
				self.builds.watch(&graph.id);
			}
		}
	}

	/// Cadence of the job cross-check right now.
	pub fn job_check_cadence(&self) -> Duration {
		let any_active = self
			.catalog
			.graphs()
			.iter()
			.any(|g| g.status == GraphStatus::Building);
		self.config.polling.job_check_cadence(any_active)
	}

	/// Periodically re-list graphs and pick up builds started elsewhere.
	pub fn start_job_watch(self: &Rc<Self>) {
		if self.shutdown.is_cancelled() {
			return;
		}
		let handle = PollHandle::new();
		let token = handle.token();
		// Replacing the handle cancels a previous watcher.
		*self.job_watch.borrow_mut() = Some(handle);
		self.scheduler.spawn(Box::pin(job_watch_loop(
			Rc::downgrade(self),
			self.scheduler.clone(),
			token,
		)));
	}

	fn spawn_reload(self: &Rc<Self>, force: bool) {
		let weak = Rc::downgrade(self);
		self.scheduler.spawn(Box::pin(async move {
			if let Some(ws) = weak.upgrade() {
				// Failures are already reported as notices.
				let _ = ws.cache.refetch(force).await;
			}
		}));
	}

	fn react(self: &Rc<Self>, event: &WorkspaceEvent) {
		match event {
			WorkspaceEvent::GraphSelected(id) => {
				self.cache.set_active(Some(id.clone()));
				self.selection.deselect();
				self.suggestions.clear();
				self.bus.emit(&WorkspaceEvent::NoticeCleared);
				if self
					.catalog
					.graph(id)
					.is_some_and(|g| g.status == GraphStatus::Building)
				{
					self.builds.watch(id);
				}
				self.spawn_reload(true);
			}
			WorkspaceEvent::GraphDeselected => {
				self.cache.set_active(None);
				self.selection.deselect();
				self.suggestions.clear();
				self.bus.emit(&WorkspaceEvent::NoticeCleared);
			}
			WorkspaceEvent::BuildUpdated {
				graph,
				phase: BuildPhase::Finished(GraphStatus::Ready),
			} if self.catalog.selected().as_ref() == Some(&graph.id) => {
				debug!("build for selected graph {} ready, reloading", graph.id);
				self.spawn_reload(true);
			}
			WorkspaceEvent::DataLoaded { .. } => {
				self.selection.revalidate(&self.cache.data());
			}
			WorkspaceEvent::ConnectionsSaved { graph_id, .. }
				if self.catalog.selected().as_ref() == Some(graph_id) =>
			{
				let (_, target) = self.cache.cross_links();
				self.cache.set_cross_links(true, target);
				self.spawn_reload(true);
			}
			_ => {}
		}
	}
}

async fn job_watch_loop(workspace: Weak<Workspace>, scheduler: Rc<dyn Scheduler>, token: CancelToken) {
	loop {
		let Some(cadence) = workspace.upgrade().map(|ws| ws.job_check_cadence()) else {
			return;
		};
		scheduler.sleep(cadence).await;
		let Some(ws) = workspace.upgrade() else {
			return;
		};
		if token.is_cancelled() || ws.shutdown.is_cancelled() {
			return;
		}
		if ws.catalog.refresh(true).await.is_ok() {
			ws.watch_building();
		}
	}
}
