//! Graph list, CRUD and the single selected graph.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info};

use super::report;
use crate::api::GraphApi;
use crate::error::{GraphError, Result};
use crate::events::{EventBus, WorkspaceEvent};
use crate::model::{Graph, GraphConfig, GraphId};
use crate::scheduler::Scheduler;

/// Client-side copy of the user's graph records.
pub struct GraphCatalog {
	api: Rc<dyn GraphApi>,
	scheduler: Rc<dyn Scheduler>,
	bus: Rc<EventBus<WorkspaceEvent>>,
	refresh_floor_ms: f64,
	graphs: RefCell<Vec<Graph>>,
	selected: RefCell<Option<GraphId>>,
	last_listed: Cell<Option<f64>>,
}

impl GraphCatalog {
	/// Empty catalog; call [`GraphCatalog::list`] to populate it.
	pub fn new(
		api: Rc<dyn GraphApi>,
		scheduler: Rc<dyn Scheduler>,
		bus: Rc<EventBus<WorkspaceEvent>>,
		refresh_floor_ms: f64,
	) -> Self {
		Self {
			api,
			scheduler,
			bus,
			refresh_floor_ms,
			graphs: RefCell::new(Vec::new()),
			selected: RefCell::new(None),
			last_listed: Cell::new(None),
		}
	}

	/// Fetch every graph of the user.
	pub async fn list(&self) -> Result<Vec<Graph>> {
		match self.api.list_graphs().await {
			Ok(graphs) => {
				self.replace_all(graphs.clone());
				Ok(graphs)
			}
			Err(err) => Err(report(&self.bus, err)),
		}
	}

	/// Re-list unless the last listing is younger than the floor.
	///
	/// Returns whether a request was made.
	pub async fn refresh(&self, force: bool) -> Result<bool> {
		if !force
			&& let Some(last) = self.last_listed.get()
			&& self.scheduler.now_ms() - last < self.refresh_floor_ms
		{
			debug!("catalog refresh throttled");
			return Ok(false);
		}
		self.list().await.map(|_| true)
	}

	/// Create a graph and select it.
	pub async fn create(&self, config: &GraphConfig) -> Result<Graph> {
		config.validate().map_err(|e| report(&self.bus, e))?;
		let graph = self
			.api
			.create_graph(&config.normalized())
			.await
			.map_err(|e| report(&self.bus, e))?;
		info!("created graph {} ({})", graph.id, graph.name);
		self.apply_record(graph.clone());
		self.select(Some(graph.id.clone()));
		Ok(graph)
	}

	/// Update a graph's configuration and select it.
	pub async fn update(&self, id: &GraphId, config: &GraphConfig) -> Result<Graph> {
		config.validate().map_err(|e| report(&self.bus, e))?;
		let graph = self
			.api
			.update_graph(id, &config.normalized())
			.await
			.map_err(|e| report(&self.bus, e))?;
		info!("updated graph {}", graph.id);
		self.apply_record(graph.clone());
		self.select(Some(graph.id.clone()));
		Ok(graph)
	}

	/// Delete a graph; deselects it if it was selected.
	pub async fn delete(&self, id: &GraphId) -> Result<()> {
		self.api
			.delete_graph(id)
			.await
			.map_err(|e| report(&self.bus, e))?;
		info!("deleted graph {id}");
		self.graphs.borrow_mut().retain(|g| &g.id != id);
		let was_selected = self.selected.borrow().as_ref() == Some(id);
		if was_selected {
			self.select(None);
		}
		self.bus.emit(&WorkspaceEvent::CatalogChanged);
		Ok(())
	}

	/// Select a graph, or clear the selection with `None`.
	///
	/// Returns whether the selection changed. Unknown ids are rejected.
	pub fn select(&self, id: Option<GraphId>) -> bool {
		if let Some(id) = &id
			&& self.graph(id).is_none()
		{
			report(&self.bus, GraphError::GraphNotFound(id.clone()));
			return false;
		}
		if *self.selected.borrow() == id {
			return false;
		}
		*self.selected.borrow_mut() = id.clone();
		match id {
			Some(id) => {
				info!("selected graph {id}");
				self.bus.emit(&WorkspaceEvent::GraphSelected(id));
			}
			None => {
				info!("graph deselected");
				self.bus.emit(&WorkspaceEvent::GraphDeselected);
			}
		}
		true
	}

	/// Currently selected graph id.
	pub fn selected(&self) -> Option<GraphId> {
		self.selected.borrow().clone()
	}

	/// Currently selected graph record.
	pub fn selected_graph(&self) -> Option<Graph> {
		let id = self.selected()?;
		self.graph(&id)
	}

	/// Snapshot of all records.
	pub fn graphs(&self) -> Vec<Graph> {
		self.graphs.borrow().clone()
	}

	/// One record by id.
	pub fn graph(&self, id: &str) -> Option<Graph> {
		self.graphs.borrow().iter().find(|g| g.id == id).cloned()
	}

	/// Insert or overwrite one record. Last write wins.
	pub fn apply_record(&self, graph: Graph) {
		{
			let mut graphs = self.graphs.borrow_mut();
			match graphs.iter_mut().find(|g| g.id == graph.id) {
				Some(slot) => *slot = graph,
				None => graphs.push(graph),
			}
		}
		self.bus.emit(&WorkspaceEvent::CatalogChanged);
	}

	/// Replace the whole list, e.g. after a fresh listing.
	pub fn replace_all(&self, graphs: Vec<Graph>) {
		*self.graphs.borrow_mut() = graphs;
		self.last_listed.set(Some(self.scheduler.now_ms()));
		self.bus.emit(&WorkspaceEvent::CatalogChanged);

		let selected = self.selected();
		if let Some(id) = selected
			&& self.graph(&id).is_none()
		{
			debug!("selected graph {id} vanished from listing");
			self.select(None);
		}
	}
}

#[cfg(test)]
mod tests {
	use futures::executor::block_on;

	use super::*;
	use crate::model::GraphStatus;
	use crate::testing::{MockApi, TestScheduler, graph};

	fn catalog(api: Rc<MockApi>) -> (GraphCatalog, Rc<RefCell<Vec<WorkspaceEvent>>>) {
		let bus = EventBus::new();
		let events = Rc::new(RefCell::new(Vec::new()));
		let sink = events.clone();
		bus.subscribe(move |e: &WorkspaceEvent| sink.borrow_mut().push(e.clone()))
			.detach();
		let catalog = GraphCatalog::new(api, TestScheduler::new(), bus, 15_000.0);
		(catalog, events)
	}

	#[test]
	fn create_rejects_empty_name_without_network() {
		let api = MockApi::new();
		let (catalog, events) = catalog(api.clone());
		let err = block_on(catalog.create(&GraphConfig::default())).unwrap_err();
		assert!(matches!(err, GraphError::Validation(_)));
		assert!(api.calls.borrow().is_empty());
		assert!(matches!(events.borrow().last(), Some(WorkspaceEvent::Notice(_))));
	}

	#[test]
	fn create_auto_selects() {
		let api = MockApi::new();
		let (catalog, events) = catalog(api.clone());
		let config = GraphConfig {
			name: " Biology Core ".into(),
			document_ids: vec!["7".into()],
			..GraphConfig::default()
		};
		let created = block_on(catalog.create(&config)).unwrap();
		assert_eq!(created.status, GraphStatus::Draft);
		assert_eq!(created.name, "Biology Core");
		assert_eq!(catalog.selected(), Some(created.id.clone()));
		assert!(events
			.borrow()
			.contains(&WorkspaceEvent::GraphSelected(created.id)));
	}

	#[test]
	fn deleting_selected_graph_deselects() {
		let api = MockApi::new()
			.with_graph(graph("a", GraphStatus::Ready))
			.with_graph(graph("b", GraphStatus::Ready));
		let (catalog, events) = catalog(api);
		block_on(catalog.list()).unwrap();
		assert!(catalog.select(Some("a".into())));
		block_on(catalog.delete(&"a".to_string())).unwrap();
		assert_eq!(catalog.selected(), None);
		assert_eq!(catalog.graphs().len(), 1);
		assert!(events.borrow().contains(&WorkspaceEvent::GraphDeselected));
	}

	#[test]
	fn select_is_exclusive_and_checked() {
		let api = MockApi::new()
			.with_graph(graph("a", GraphStatus::Ready))
			.with_graph(graph("b", GraphStatus::Draft));
		let (catalog, _) = catalog(api);
		block_on(catalog.list()).unwrap();
		assert!(catalog.select(Some("a".into())));
		assert!(!catalog.select(Some("a".into())));
		assert!(catalog.select(Some("b".into())));
		assert_eq!(catalog.selected_graph().unwrap().id, "b");
		assert!(!catalog.select(Some("zzz".into())));
		assert_eq!(catalog.selected(), Some("b".into()));
	}

	#[test]
	fn refresh_honours_floor() {
		let api = MockApi::new().with_graph(graph("a", GraphStatus::Ready));
		let (catalog, _) = catalog(api.clone());
		assert!(block_on(catalog.refresh(false)).unwrap());
		assert!(!block_on(catalog.refresh(false)).unwrap());
		assert!(block_on(catalog.refresh(true)).unwrap());
		assert_eq!(api.call_count("list_graphs"), 2);
	}

	#[test]
	fn server_failure_keeps_records() {
		let api = MockApi::new().with_graph(graph("a", GraphStatus::Ready));
		let (catalog, _) = catalog(api.clone());
		block_on(catalog.list()).unwrap();
		api.fail_once(
			"list_graphs",
			GraphError::Server {
				status: 500,
				message: "boom".into(),
			},
		);
		assert!(block_on(catalog.list()).is_err());
		assert_eq!(catalog.graphs().len(), 1);
	}
}
