//! Build triggering and status polling.
//!
//! At most one build is in flight per graph, and at most one poller watches
//! a graph at any time. Pollers are owned through [`PollHandle`]s kept in a
//! map keyed by graph id: replacing or removing an entry cancels the old task.
//! A paused or rate-limited job is reported but never stops polling; only a
//! terminal status (`ready`/`error`), a vanished record, cancellation or the
//! workspace shutdown token end the loop.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, error, info, warn};

use super::catalog::GraphCatalog;
use super::report;
use crate::api::GraphApi;
use crate::config::PollingConfig;
use crate::error::{GraphError, Result};
use crate::events::{BuildPhase, EventBus, WorkspaceEvent};
use crate::model::{BuildRequest, Graph, GraphId, GraphStatus};
use crate::scheduler::{CancelToken, PollHandle, Scheduler};

/// Result of one status poll.
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
	/// Still building, keep polling.
	Continue(BuildPhase),
	/// Terminal status reached.
	Finished(GraphStatus),
	/// The record no longer exists.
	Vanished,
}

/// Interpret a record's build state.
pub fn build_phase(graph: &Graph) -> BuildPhase {
	match graph.status {
		status if status.is_terminal() => BuildPhase::Finished(status),
		_ if graph.is_paused() => BuildPhase::Paused {
			progress: graph.progress(),
			reason: graph
				.build_step
				.clone()
				.filter(|s| s.to_ascii_lowercase().contains("rate_limit"))
				.or_else(|| graph.ingestion_job_status.clone())
				.unwrap_or_else(|| "paused".to_string()),
		},
		_ => BuildPhase::Running {
			progress: graph.progress(),
			step: graph.build_step.clone(),
		},
	}
}

fn phase_status(phase: &BuildPhase) -> GraphStatus {
	match phase {
		BuildPhase::Finished(status) => *status,
		BuildPhase::Running { .. } | BuildPhase::Paused { .. } => GraphStatus::Building,
	}
}

/// Triggers builds and polls their status until terminal.
pub struct BuildSupervisor {
	api: Rc<dyn GraphApi>,
	scheduler: Rc<dyn Scheduler>,
	bus: Rc<EventBus<WorkspaceEvent>>,
	catalog: Rc<GraphCatalog>,
	polling: PollingConfig,
	shutdown: CancelToken,
	in_flight: RefCell<HashSet<GraphId>>,
	pollers: RefCell<HashMap<GraphId, PollHandle>>,
	phases: RefCell<HashMap<GraphId, BuildPhase>>,
	modal_open: Cell<bool>,
}

impl BuildSupervisor {
	/// Supervisor writing status updates into `catalog`.
	pub fn new(
		api: Rc<dyn GraphApi>,
		scheduler: Rc<dyn Scheduler>,
		bus: Rc<EventBus<WorkspaceEvent>>,
		catalog: Rc<GraphCatalog>,
		polling: PollingConfig,
		shutdown: CancelToken,
	) -> Rc<Self> {
		Rc::new(Self {
			api,
			scheduler,
			bus,
			catalog,
			polling,
			shutdown,
			in_flight: RefCell::new(HashSet::new()),
			pollers: RefCell::new(HashMap::new()),
			phases: RefCell::new(HashMap::new()),
			modal_open: Cell::new(false),
		})
	}

	/// Whether a build is running or being requested for `graph_id`.
	pub fn is_building(&self, graph_id: &str) -> bool {
		self.in_flight.borrow().contains(graph_id)
			|| self.pollers.borrow().contains_key(graph_id)
			|| self
				.catalog
				.graph(graph_id)
				.is_some_and(|g| g.status == GraphStatus::Building)
	}

	/// Whether a poller is watching `graph_id`.
	pub fn is_polling(&self, graph_id: &str) -> bool {
		self.pollers.borrow().contains_key(graph_id)
	}

	/// Number of live pollers.
	pub fn poller_count(&self) -> usize {
		self.pollers.borrow().len()
	}

	/// Last known phase of a graph's build.
	pub fn phase(&self, graph_id: &str) -> Option<BuildPhase> {
		self.phases.borrow().get(graph_id).cloned()
	}

	/// The build configuration modal opened or closed.
	pub fn set_modal_open(&self, open: bool) {
		self.modal_open.set(open);
	}

	/// Poll cadence right now.
	pub fn cadence(&self) -> Duration {
		self.polling.build_cadence(self.modal_open.get())
	}

	/// Ask the backend to build `graph_id`, then poll until terminal.
	pub async fn trigger_build(self: &Rc<Self>, graph_id: &GraphId, request: &BuildRequest) -> Result<()> {
		request.validate().map_err(|e| report(&self.bus, e))?;
		let Some(graph) = self.catalog.graph(graph_id) else {
			return Err(report(&self.bus, GraphError::GraphNotFound(graph_id.clone())));
		};
		if self.is_building(graph_id) {
			return Err(report(&self.bus, GraphError::BuildInFlight(graph_id.clone())));
		}

		self.in_flight.borrow_mut().insert(graph_id.clone());
		let result = self.api.trigger_build(graph_id, request).await;
		self.in_flight.borrow_mut().remove(graph_id);
		result.map_err(|e| report(&self.bus, e))?;

		info!(
			"build started for {graph_id} ({:?}, {:?})",
			request.build_mode, request.source_mode
		);
		let building = Graph {
			status: GraphStatus::Building,
			build_progress: 0.0,
			error_message: None,
			build_step: None,
			ingestion_job_status: None,
			..graph
		};
		self.bus.emit(&WorkspaceEvent::NoticeCleared);
		self.record(building);
		self.watch(graph_id);
		Ok(())
	}

	/// Start polling `graph_id` unless a poller already watches it.
	pub fn watch(self: &Rc<Self>, graph_id: &GraphId) {
		if self.shutdown.is_cancelled() || self.is_polling(graph_id) {
			return;
		}
		let handle = PollHandle::new();
		let token = handle.token();
		self.pollers.borrow_mut().insert(graph_id.clone(), handle);
		debug!("polling {graph_id}");

		let weak = Rc::downgrade(self);
		let scheduler = self.scheduler.clone();
		let graph_id = graph_id.clone();
		self.scheduler
			.spawn(Box::pin(poll_loop(weak, scheduler, graph_id, token)));
	}

	/// Stop polling `graph_id`.
	pub fn stop(&self, graph_id: &str) {
		if self.pollers.borrow_mut().remove(graph_id).is_some() {
			debug!("stopped polling {graph_id}");
		}
	}

	/// Stop every poller.
	pub fn stop_all(&self) {
		let pollers = std::mem::take(&mut *self.pollers.borrow_mut());
		drop(pollers);
	}

	/// Fetch the record once and publish its build state.
	pub async fn poll_once(&self, graph_id: &GraphId) -> Result<PollOutcome> {
		let graphs = self.api.list_graphs().await?;
		let found = graphs.iter().find(|g| &g.id == graph_id).cloned();
		self.catalog.replace_all(graphs);

		let Some(graph) = found else {
			warn!("graph {graph_id} vanished while building");
			self.phases.borrow_mut().remove(graph_id);
			return Ok(PollOutcome::Vanished);
		};

		let previous = self.phases.borrow().get(graph_id).map(phase_status);
		if let Some(previous) = previous
			&& !previous.can_transition_to(&graph.status)
		{
			warn!(
				"graph {graph_id} went {} -> {} while polling",
				previous.as_str(),
				graph.status.as_str()
			);
		}

		let phase = build_phase(&graph);
		match &phase {
			BuildPhase::Paused { reason, .. } => info!("build for {graph_id} paused: {reason}"),
			BuildPhase::Running { progress, .. } => debug!("build for {graph_id} at {progress:.0}%"),
			BuildPhase::Finished(status) => info!("build for {graph_id} finished: {}", status.as_str()),
		}
		let status = graph.status;
		let message = graph.error_message.clone();
		self.publish(graph, phase.clone());

		Ok(match phase {
			BuildPhase::Finished(GraphStatus::Error) => {
				let err = GraphError::JobFailed {
					graph_id: graph_id.clone(),
					message: message.unwrap_or_else(|| "Build failed".to_string()),
				};
				error!("{err}");
				self.bus.emit(&WorkspaceEvent::Notice(err.to_notice()));
				PollOutcome::Finished(status)
			}
			BuildPhase::Finished(status) => PollOutcome::Finished(status),
			other => PollOutcome::Continue(other),
		})
	}

	fn record(&self, graph: Graph) {
		let phase = build_phase(&graph);
		self.publish(graph, phase);
	}

	fn publish(&self, graph: Graph, phase: BuildPhase) {
		self.phases
			.borrow_mut()
			.insert(graph.id.clone(), phase.clone());
		self.catalog.apply_record(graph.clone());
		self.bus.emit(&WorkspaceEvent::BuildUpdated { graph, phase });
	}

	/// Drop the poller entry if it still belongs to `token`.
	fn release(&self, graph_id: &str, token: &CancelToken) {
		let mut pollers = self.pollers.borrow_mut();
		if pollers
			.get(graph_id)
			.is_some_and(|h| h.token().same_as(token))
		{
			pollers.remove(graph_id);
		}
	}
}

async fn poll_loop(
	supervisor: Weak<BuildSupervisor>,
	scheduler: Rc<dyn Scheduler>,
	graph_id: GraphId,
	token: CancelToken,
) {
	let mut failures = 0u32;
	loop {
		let Some(cadence) = supervisor.upgrade().map(|s| s.cadence()) else {
			return;
		};
		scheduler.sleep(cadence).await;

		let Some(this) = supervisor.upgrade() else {
			return;
		};
		if token.is_cancelled() || this.shutdown.is_cancelled() {
			debug!("poller for {graph_id} cancelled");
			this.release(&graph_id, &token);
			return;
		}

		match this.poll_once(&graph_id).await {
			Ok(PollOutcome::Continue(_)) => failures = 0,
			Ok(PollOutcome::Finished(_) | PollOutcome::Vanished) => {
				this.release(&graph_id, &token);
				return;
			}
			Err(err) => {
				failures += 1;
				warn!("status poll for {graph_id} failed ({failures}x): {err}");
				if failures == 1 {
					report(&this.bus, err);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use futures::executor::block_on;

	use super::*;
	use crate::model::BuildMode;
	use crate::testing::{MockApi, TestScheduler, graph};

	struct Fixture {
		api: Rc<MockApi>,
		scheduler: Rc<TestScheduler>,
		catalog: Rc<GraphCatalog>,
		supervisor: Rc<BuildSupervisor>,
		events: Rc<RefCell<Vec<WorkspaceEvent>>>,
		shutdown: CancelToken,
	}

	fn fixture(api: Rc<MockApi>) -> Fixture {
		let scheduler = TestScheduler::new();
		let bus = EventBus::new();
		let events = Rc::new(RefCell::new(Vec::new()));
		let sink = events.clone();
		bus.subscribe(move |e: &WorkspaceEvent| sink.borrow_mut().push(e.clone()))
			.detach();
		let catalog = Rc::new(GraphCatalog::new(
			api.clone(),
			scheduler.clone(),
			bus.clone(),
			15_000.0,
		));
		block_on(catalog.list()).unwrap();
		let shutdown = CancelToken::new();
		let supervisor = BuildSupervisor::new(
			api.clone(),
			scheduler.clone(),
			bus,
			catalog.clone(),
			PollingConfig::default(),
			shutdown.clone(),
		);
		Fixture {
			api,
			scheduler,
			catalog,
			supervisor,
			events,
			shutdown,
		}
	}

	fn building(id: &str, progress: f64) -> Graph {
		Graph {
			build_progress: progress,
			..graph(id, GraphStatus::Building)
		}
	}

	fn paused(id: &str, progress: f64) -> Graph {
		Graph {
			build_step: Some("llm_rate_limit_backoff".into()),
			..building(id, progress)
		}
	}

	#[test]
	fn build_polls_until_ready() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Draft)));
		f.api.script_status(
			"bio",
			vec![
				building("bio", 10.0),
				building("bio", 60.0),
				Graph {
					node_count: 12,
					..graph("bio", GraphStatus::Ready)
				},
			],
		);
		let request = BuildRequest::default();
		block_on(f.supervisor.trigger_build(&"bio".into(), &request)).unwrap();
		assert_eq!(f.catalog.graph("bio").unwrap().status, GraphStatus::Building);
		assert!(f.supervisor.is_polling("bio"));

		f.scheduler.run();

		assert_eq!(f.api.call_count("list_graphs"), 1 + 3);
		let record = f.catalog.graph("bio").unwrap();
		assert_eq!(record.status, GraphStatus::Ready);
		assert_eq!(record.node_count, 12);
		assert!(!f.supervisor.is_polling("bio"));
		assert_eq!(
			f.supervisor.phase("bio"),
			Some(BuildPhase::Finished(GraphStatus::Ready))
		);
		assert!(f
			.scheduler
			.sleeps
			.borrow()
			.iter()
			.all(|d| *d == Duration::from_secs(6)));
	}

	#[test]
	fn second_trigger_is_rejected_while_building() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Ready)));
		let request = BuildRequest {
			build_mode: BuildMode::Rebuild,
			..BuildRequest::default()
		};
		block_on(f.supervisor.trigger_build(&"bio".into(), &request)).unwrap();
		let err = block_on(f.supervisor.trigger_build(&"bio".into(), &request)).unwrap_err();
		assert_eq!(err, GraphError::BuildInFlight("bio".into()));
		assert_eq!(f.api.builds.borrow().len(), 1);
		assert_eq!(f.supervisor.poller_count(), 1);
	}

	#[test]
	fn graph_already_building_on_backend_is_rejected() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Building)));
		let err = block_on(f.supervisor.trigger_build(&"bio".into(), &BuildRequest::default()))
			.unwrap_err();
		assert!(matches!(err, GraphError::BuildInFlight(_)));
		assert_eq!(f.api.call_count("trigger_build"), 0);
	}

	#[test]
	fn pause_keeps_polling() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Draft)));
		f.api.script_status(
			"bio",
			vec![
				paused("bio", 20.0),
				paused("bio", 20.0),
				building("bio", 70.0),
				graph("bio", GraphStatus::Ready),
			],
		);
		block_on(f.supervisor.trigger_build(&"bio".into(), &BuildRequest::default())).unwrap();
		f.scheduler.run();

		assert_eq!(f.api.call_count("list_graphs"), 1 + 4);
		let phases: Vec<BuildPhase> = f
			.events
			.borrow()
			.iter()
			.filter_map(|e| match e {
				WorkspaceEvent::BuildUpdated { phase, .. } => Some(phase.clone()),
				_ => None,
			})
			.collect();
		assert!(matches!(phases[1], BuildPhase::Paused { .. }));
		assert!(matches!(phases[2], BuildPhase::Paused { .. }));
		assert!(matches!(phases[3], BuildPhase::Running { .. }));
		assert_eq!(phases[4], BuildPhase::Finished(GraphStatus::Ready));
		assert!(!f.events.borrow().iter().any(|e| matches!(
			e,
			WorkspaceEvent::Notice(n) if n.kind == crate::error::ErrorKind::JobFailure
		)));
	}

	#[test]
	fn job_failure_stops_polling_with_sticky_notice() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Draft)));
		f.api.script_status(
			"bio",
			vec![
				building("bio", 30.0),
				Graph {
					error_message: Some("no text extracted".into()),
					..graph("bio", GraphStatus::Error)
				},
			],
		);
		block_on(f.supervisor.trigger_build(&"bio".into(), &BuildRequest::default())).unwrap();
		f.scheduler.run();
		assert!(!f.supervisor.is_polling("bio"));
		assert_eq!(f.scheduler.sleep_count(), 2);
		let notice = f
			.events
			.borrow()
			.iter()
			.find_map(|e| match e {
				WorkspaceEvent::Notice(n) => Some(n.clone()),
				_ => None,
			})
			.unwrap();
		assert!(!notice.dismissible);
		assert!(notice.message.contains("no text extracted"));
	}

	#[test]
	fn transient_poll_error_does_not_stop_polling() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Draft)));
		f.api.script_status("bio", vec![graph("bio", GraphStatus::Ready)]);
		block_on(f.supervisor.trigger_build(&"bio".into(), &BuildRequest::default())).unwrap();
		f.api
			.fail_once("list_graphs", GraphError::Network("offline".into()));
		f.scheduler.run();
		assert_eq!(f.catalog.graph("bio").unwrap().status, GraphStatus::Ready);
		assert_eq!(f.scheduler.sleep_count(), 2);
	}

	#[test]
	fn modal_tightens_cadence() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Draft)));
		f.api.script_status(
			"bio",
			vec![building("bio", 50.0), graph("bio", GraphStatus::Ready)],
		);
		f.supervisor.set_modal_open(true);
		block_on(f.supervisor.trigger_build(&"bio".into(), &BuildRequest::default())).unwrap();
		f.scheduler.run();
		assert_eq!(
			*f.scheduler.sleeps.borrow(),
			vec![Duration::from_secs(2), Duration::from_secs(2)]
		);
	}

	#[test]
	fn opening_modal_mid_build_tightens_next_poll() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Draft)));
		f.api.script_status(
			"bio",
			vec![building("bio", 40.0), graph("bio", GraphStatus::Ready)],
		);
		block_on(f.supervisor.trigger_build(&"bio".into(), &BuildRequest::default())).unwrap();
		let release = f.api.gate_list();
		f.scheduler.run();
		assert_eq!(*f.scheduler.sleeps.borrow(), vec![Duration::from_secs(6)]);

		f.supervisor.set_modal_open(true);
		release.send(()).unwrap();
		f.scheduler.run();

		assert_eq!(
			*f.scheduler.sleeps.borrow(),
			vec![Duration::from_secs(6), Duration::from_secs(2)]
		);
		assert_eq!(f.catalog.graph("bio").unwrap().status, GraphStatus::Ready);
		assert_eq!(f.supervisor.cadence(), Duration::from_secs(2));
		f.supervisor.set_modal_open(false);
		assert_eq!(f.supervisor.cadence(), Duration::from_secs(6));
	}

	#[test]
	fn cancelled_poller_stops_and_watch_is_single() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Building)));
		f.supervisor.watch(&"bio".into());
		f.supervisor.watch(&"bio".into());
		assert_eq!(f.supervisor.poller_count(), 1);
		f.supervisor.stop("bio");
		f.scheduler.run();
		assert_eq!(f.api.call_count("list_graphs"), 1);
		assert_eq!(f.supervisor.poller_count(), 0);
	}

	#[test]
	fn shutdown_stops_every_poller() {
		let f = fixture(
			MockApi::new()
				.with_graph(graph("a", GraphStatus::Building))
				.with_graph(graph("b", GraphStatus::Building)),
		);
		f.supervisor.watch(&"a".into());
		f.supervisor.watch(&"b".into());
		f.shutdown.cancel();
		f.scheduler.run();
		assert_eq!(f.api.call_count("list_graphs"), 1);
		assert_eq!(f.supervisor.poller_count(), 0);
		f.supervisor.watch(&"a".into());
		assert_eq!(f.supervisor.poller_count(), 0);
	}

	#[test]
	fn vanished_graph_stops_polling() {
		let f = fixture(MockApi::new().with_graph(graph("bio", GraphStatus::Building)));
		f.supervisor.watch(&"bio".into());
		f.api.graphs.borrow_mut().clear();
		f.scheduler.run();
		assert!(!f.supervisor.is_polling("bio"));
		assert!(f.catalog.graph("bio").is_none());
	}
}
