//! Test doubles: a scripted backend and a deterministic scheduler.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{self, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use serde_json::Value;

use crate::api::{DataQuery, GraphApi, SaveConnectionsRequest, SuggestRequest};
use crate::error::{GraphError, Result};
use crate::model::{
	BuildRequest, ConnectionSuggestion, DocumentRef, Graph, GraphConfig, GraphId, GraphStatus,
	RawGraphData,
};
use crate::scheduler::Scheduler;

/// In-memory backend that records every call.
#[derive(Default)]
pub(crate) struct MockApi {
	pub graphs: RefCell<Vec<Graph>>,
	/// Records handed out, one per `list_graphs`, replacing the stored one.
	pub status_script: RefCell<HashMap<GraphId, VecDeque<Graph>>>,
	pub data: RefCell<HashMap<GraphId, Value>>,
	pub suggestions: RefCell<Vec<ConnectionSuggestion>>,
	pub saved: RefCell<Vec<SaveConnectionsRequest>>,
	pub builds: RefCell<Vec<(GraphId, BuildRequest)>>,
	pub calls: RefCell<Vec<String>>,
	failures: RefCell<HashMap<&'static str, GraphError>>,
	gates: RefCell<HashMap<GraphId, oneshot::Receiver<()>>>,
	suggest_gate: RefCell<Option<oneshot::Receiver<()>>>,
	list_gate: RefCell<Option<oneshot::Receiver<()>>>,
	next_id: Cell<u32>,
}

impl MockApi {
	pub fn new() -> Rc<Self> {
		Rc::new(Self::default())
	}

	pub fn with_graph(self: Rc<Self>, graph: Graph) -> Rc<Self> {
		self.graphs.borrow_mut().push(graph);
		self
	}

	pub fn set_data(&self, id: &str, payload: Value) {
		self.data.borrow_mut().insert(id.to_string(), payload);
	}

	pub fn script_status(&self, id: &str, records: Vec<Graph>) {
		self.status_script
			.borrow_mut()
			.insert(id.to_string(), records.into());
	}

	pub fn fail_once(&self, method: &'static str, err: GraphError) {
		self.failures.borrow_mut().insert(method, err);
	}

	/// Hold `graph_data` for `id` until the returned sender fires.
	pub fn gate_data(&self, id: &str) -> oneshot::Sender<()> {
		let (tx, rx) = oneshot::channel();
		self.gates.borrow_mut().insert(id.to_string(), rx);
		tx
	}

	/// Hold the next `suggest_connections` until the returned sender fires.
	pub fn gate_suggest(&self) -> oneshot::Sender<()> {
		let (tx, rx) = oneshot::channel();
		*self.suggest_gate.borrow_mut() = Some(rx);
		tx
	}

	/// Hold the next `list_graphs` until the returned sender fires.
	pub fn gate_list(&self) -> oneshot::Sender<()> {
		let (tx, rx) = oneshot::channel();
		*self.list_gate.borrow_mut() = Some(rx);
		tx
	}

	pub fn call_count(&self, method: &str) -> usize {
		self.calls
			.borrow()
			.iter()
			.filter(|c| c.as_str() == method)
			.count()
	}

	fn record(&self, method: &'static str) -> Result<()> {
		self.calls.borrow_mut().push(method.to_string());
		match self.failures.borrow_mut().remove(method) {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}
}

/// A graph record in the given state.
pub(crate) fn graph(id: &str, status: GraphStatus) -> Graph {
	Graph {
		id: id.to_string(),
		name: format!("Graph {id}"),
		status,
		..Graph::default()
	}
}

#[async_trait(?Send)]
impl GraphApi for MockApi {
	async fn list_graphs(&self) -> Result<Vec<Graph>> {
		let gate = self.list_gate.borrow_mut().take();
		if let Some(gate) = gate {
			let _ = gate.await;
		}
		self.record("list_graphs")?;
		let mut graphs = self.graphs.borrow_mut();
		for (id, script) in self.status_script.borrow_mut().iter_mut() {
			if let Some(next) = script.pop_front() {
				match graphs.iter_mut().find(|g| &g.id == id) {
					Some(slot) => *slot = next,
					None => graphs.push(next),
				}
			}
		}
		Ok(graphs.clone())
	}

	async fn create_graph(&self, config: &GraphConfig) -> Result<Graph> {
		self.record("create_graph")?;
		let n = self.next_id.get() + 1;
		self.next_id.set(n);
		let graph = Graph {
			id: format!("new{n}"),
			name: config.name.clone(),
			description: config.description.clone(),
			document_ids: config.document_ids.clone(),
			extraction_max_chars: config.extraction_max_chars,
			chunk_size: config.chunk_size,
			..Graph::default()
		};
		self.graphs.borrow_mut().push(graph.clone());
		Ok(graph)
	}

	async fn update_graph(&self, id: &GraphId, config: &GraphConfig) -> Result<Graph> {
		self.record("update_graph")?;
		let mut graphs = self.graphs.borrow_mut();
		let graph = graphs
			.iter_mut()
			.find(|g| &g.id == id)
			.ok_or_else(|| GraphError::Server {
				status: 404,
				message: "not found".into(),
			})?;
		graph.name = config.name.clone();
		graph.description = config.description.clone();
		graph.document_ids = config.document_ids.clone();
		Ok(graph.clone())
	}

	async fn delete_graph(&self, id: &GraphId) -> Result<()> {
		self.record("delete_graph")?;
		self.graphs.borrow_mut().retain(|g| &g.id != id);
		Ok(())
	}

	async fn trigger_build(&self, id: &GraphId, request: &BuildRequest) -> Result<()> {
		self.record("trigger_build")?;
		self.builds
			.borrow_mut()
			.push((id.clone(), request.clone()));
		if let Some(graph) = self.graphs.borrow_mut().iter_mut().find(|g| &g.id == id) {
			graph.status = GraphStatus::Building;
			graph.build_progress = 0.0;
		}
		Ok(())
	}

	async fn graph_data(&self, id: &GraphId, _query: &DataQuery) -> Result<RawGraphData> {
		let gate = self.gates.borrow_mut().remove(id);
		if let Some(gate) = gate {
			let _ = gate.await;
		}
		self.record("graph_data")?;
		let payload = self
			.data
			.borrow()
			.get(id)
			.cloned()
			.unwrap_or_else(|| serde_json::json!({"nodes": [], "links": []}));
		Ok(serde_json::from_value(payload)?)
	}

	async fn suggest_connections(
		&self,
		_id: &GraphId,
		_request: &SuggestRequest,
	) -> Result<Vec<ConnectionSuggestion>> {
		let gate = self.suggest_gate.borrow_mut().take();
		if let Some(gate) = gate {
			let _ = gate.await;
		}
		self.record("suggest_connections")?;
		Ok(self.suggestions.borrow().clone())
	}

	async fn save_connections(&self, _id: &GraphId, request: &SaveConnectionsRequest) -> Result<()> {
		self.record("save_connections")?;
		self.saved.borrow_mut().push(request.clone());
		Ok(())
	}

	async fn list_documents(&self) -> Result<Vec<DocumentRef>> {
		self.record("list_documents")?;
		Ok(vec![DocumentRef {
			id: "7".into(),
			name: "cell-biology.pdf".into(),
		}])
	}
}

/// Runs spawned tasks on a [`LocalPool`]; sleeps resolve at once and advance the clock.
pub(crate) struct TestScheduler {
	pool: RefCell<LocalPool>,
	spawner: LocalSpawner,
	pub sleeps: RefCell<Vec<Duration>>,
	now: Cell<f64>,
	max_sleeps: usize,
}

impl TestScheduler {
	pub fn new() -> Rc<Self> {
		Self::with_sleep_limit(200)
	}

	/// Sleeps past `max_sleeps` never resolve.
	pub fn with_sleep_limit(max_sleeps: usize) -> Rc<Self> {
		let pool = LocalPool::new();
		let spawner = pool.spawner();
		Rc::new(Self {
			pool: RefCell::new(pool),
			spawner,
			sleeps: RefCell::new(Vec::new()),
			now: Cell::new(1_000_000.0),
			max_sleeps,
		})
	}

	/// Drive every spawned task until none can make progress.
	pub fn run(&self) {
		self.pool.borrow_mut().run_until_stalled();
	}

	pub fn advance(&self, ms: f64) {
		self.now.set(self.now.get() + ms);
	}

	pub fn sleep_count(&self) -> usize {
		self.sleeps.borrow().len()
	}
}

impl Scheduler for TestScheduler {
	fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
		self.spawner
			.spawn_local(task)
			.expect("local pool accepts tasks");
	}

	fn sleep(&self, period: Duration) -> LocalBoxFuture<'static, ()> {
		let mut sleeps = self.sleeps.borrow_mut();
		sleeps.push(period);
		// Runaway loops park forever instead of spinning the test.
		if sleeps.len() > self.max_sleeps {
			return Box::pin(future::pending());
		}
		self.advance(period.as_millis() as f64);
		Box::pin(future::ready(()))
	}

	fn now_ms(&self) -> f64 {
		self.now.get()
	}
}
