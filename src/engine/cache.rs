//! Fetches and holds the sanitized data of the selected graph.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, info};

use super::report;
use super::sanitize::sanitize;
use crate::api::{DataQuery, GraphApi};
use crate::error::Result;
use crate::events::{EventBus, WorkspaceEvent};
use crate::model::{GraphData, GraphId};
use crate::scheduler::Scheduler;

/// What a fetch did.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
	/// New data was applied.
	Loaded(Arc<GraphData>),
	/// Skipped by the minimum-interval guard; current data is fresh enough.
	Throttled,
	/// The response arrived for a graph or request that is no longer current.
	Superseded,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LoadKey {
	graph_id: GraphId,
	query_cross: bool,
	target: Option<GraphId>,
}

#[derive(Default)]
struct CacheState {
	active: Option<GraphId>,
	/// Bumped whenever the active graph changes.
	epoch: u64,
	next_request: u64,
	applied_request: u64,
	data: Arc<GraphData>,
	loaded: Option<LoadKey>,
	last_fetch: HashMap<LoadKey, f64>,
	include_cross_links: bool,
	cross_target: Option<GraphId>,
}

/// Node/link cache for the selected graph.
pub struct GraphDataCache {
	api: Rc<dyn GraphApi>,
	scheduler: Rc<dyn Scheduler>,
	bus: Rc<EventBus<WorkspaceEvent>>,
	refetch_floor_ms: f64,
	state: RefCell<CacheState>,
}

impl GraphDataCache {
	/// Empty cache with no active graph.
	pub fn new(
		api: Rc<dyn GraphApi>,
		scheduler: Rc<dyn Scheduler>,
		bus: Rc<EventBus<WorkspaceEvent>>,
		refetch_floor_ms: f64,
	) -> Self {
		Self {
			api,
			scheduler,
			bus,
			refetch_floor_ms,
			state: RefCell::new(CacheState::default()),
		}
	}

	/// Switch the graph whose data may be committed. Clears data on change.
	pub fn set_active(&self, graph_id: Option<GraphId>) {
		let cleared = {
			let mut state = self.state.borrow_mut();
			if state.active == graph_id {
				return;
			}
			state.active = graph_id;
			state.epoch += 1;
			state.loaded = None;
			state.cross_target = None;
			state.include_cross_links = false;
			let had_data = !state.data.is_empty();
			state.data = Arc::new(GraphData::default());
			had_data
		};
		if cleared {
			self.bus.emit(&WorkspaceEvent::DataCleared);
		}
	}

	/// Graph whose data is held.
	pub fn active(&self) -> Option<GraphId> {
		self.state.borrow().active.clone()
	}

	/// Currently held data.
	pub fn data(&self) -> Arc<GraphData> {
		self.state.borrow().data.clone()
	}

	/// Whether cross-graph links are requested, and for which target graph.
	pub fn cross_links(&self) -> (bool, Option<GraphId>) {
		let state = self.state.borrow();
		(state.include_cross_links, state.cross_target.clone())
	}

	/// Choose whether refetches include cross-graph links.
	pub fn set_cross_links(&self, include: bool, target: Option<GraphId>) {
		let mut state = self.state.borrow_mut();
		state.include_cross_links = include;
		state.cross_target = if include { target } else { None };
	}

	/// Fetch, sanitize and commit data for `graph_id`.
	///
	/// The result is only committed if `graph_id` is still active and no newer
	/// fetch has committed meanwhile. On failure the held data is kept.
	pub async fn fetch(&self, graph_id: &GraphId, include_cross_links: bool) -> Result<FetchOutcome> {
		self.fetch_with(graph_id, include_cross_links, false).await
	}

	/// Refetch the active graph with the current cross-link setting.
	pub async fn refetch(&self, force: bool) -> Result<FetchOutcome> {
		let (active, include) = {
			let state = self.state.borrow();
			(state.active.clone(), state.include_cross_links)
		};
		match active {
			Some(id) => self.fetch_with(&id, include, force).await,
			None => Ok(FetchOutcome::Superseded),
		}
	}

	async fn fetch_with(
		&self,
		graph_id: &GraphId,
		include_cross_links: bool,
		force: bool,
	) -> Result<FetchOutcome> {
		let now = self.scheduler.now_ms();
		let (key, epoch, request, query) = {
			let mut state = self.state.borrow_mut();
			if state.active.as_ref() != Some(graph_id) {
				debug!("fetch for inactive graph {graph_id} skipped");
				return Ok(FetchOutcome::Superseded);
			}
			let target = if include_cross_links {
				state.cross_target.clone()
			} else {
				None
			};
			let key = LoadKey {
				graph_id: graph_id.clone(),
				query_cross: include_cross_links,
				target: target.clone(),
			};
			if !force
				&& state.loaded.as_ref() == Some(&key)
				&& let Some(last) = state.last_fetch.get(&key)
				&& now - last < self.refetch_floor_ms
			{
				debug!("fetch for {graph_id} throttled");
				return Ok(FetchOutcome::Throttled);
			}
			state.last_fetch.insert(key.clone(), now);
			state.next_request += 1;
			let query = DataQuery {
				include_connections: include_cross_links,
				target_graph_id: target,
			};
			(key, state.epoch, state.next_request, query)
		};

		let raw = match self.api.graph_data(graph_id, &query).await {
			Ok(raw) => raw,
			Err(err) => {
				self.state.borrow_mut().last_fetch.remove(&key);
				return Err(report(&self.bus, err));
			}
		};
		let sanitized = sanitize(raw);

		let data = {
			let mut state = self.state.borrow_mut();
			if state.epoch != epoch || state.active.as_ref() != Some(graph_id) {
				debug!("discarding stale data for {graph_id}");
				return Ok(FetchOutcome::Superseded);
			}
			if request < state.applied_request {
				debug!("discarding out-of-order data for {graph_id}");
				return Ok(FetchOutcome::Superseded);
			}
			state.applied_request = request;
			state.loaded = Some(key);
			state.data = Arc::new(sanitized.data);
			state.data.clone()
		};
		info!(
			"loaded graph {graph_id}: {} nodes, {} links",
			data.nodes.len(),
			data.links.len()
		);
		self.bus.emit(&WorkspaceEvent::DataLoaded {
			graph_id: graph_id.clone(),
			dropped_links: sanitized.dropped_links,
		});
		Ok(FetchOutcome::Loaded(data))
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use futures::executor::block_on;
	use futures::task::LocalSpawnExt;
	use serde_json::json;

	use super::*;
	use crate::error::GraphError;
	use crate::testing::{MockApi, TestScheduler};

	fn cache(api: Rc<MockApi>, scheduler: Rc<TestScheduler>) -> Rc<GraphDataCache> {
		Rc::new(GraphDataCache::new(api, scheduler, EventBus::new(), 3_000.0))
	}

	fn payload() -> serde_json::Value {
		json!({
			"nodes": [{"id": 1, "name": "Cell"}, {"id": 2, "name": "Nucleus"}, {"id": 3, "name": "ATP"}],
			"links": [
				{"source": 1, "target": 2},
				{"source": 2, "target": 3},
				{"source": 3, "target": 404}
			]
		})
	}

	#[test]
	fn fetch_sanitizes() {
		let api = MockApi::new();
		api.set_data("g", payload());
		let cache = cache(api, TestScheduler::new());
		cache.set_active(Some("g".into()));
		let FetchOutcome::Loaded(data) = block_on(cache.fetch(&"g".into(), false)).unwrap() else {
			panic!("expected data");
		};
		assert_eq!(data.nodes.len(), 3);
		assert_eq!(data.links.len(), 2);
		let ids: HashSet<&str> = data.nodes.iter().map(|n| n.id.as_str()).collect();
		assert!(data
			.links
			.iter()
			.all(|l| ids.contains(l.source.as_str()) && ids.contains(l.target.as_str())));
	}

	#[test]
	fn failure_keeps_previous_data() {
		let api = MockApi::new();
		api.set_data("g", payload());
		let cache = cache(api.clone(), TestScheduler::new());
		cache.set_active(Some("g".into()));
		block_on(cache.fetch(&"g".into(), false)).unwrap();
		api.fail_once("graph_data", GraphError::Network("offline".into()));
		assert!(block_on(cache.refetch(true)).is_err());
		assert_eq!(cache.data().nodes.len(), 3);
	}

	#[test]
	fn throttled_within_floor() {
		let api = MockApi::new();
		api.set_data("g", payload());
		let scheduler = TestScheduler::new();
		let cache = cache(api.clone(), scheduler.clone());
		cache.set_active(Some("g".into()));
		block_on(cache.fetch(&"g".into(), false)).unwrap();
		assert_eq!(
			block_on(cache.fetch(&"g".into(), false)).unwrap(),
			FetchOutcome::Throttled
		);
		assert!(matches!(
			block_on(cache.refetch(true)).unwrap(),
			FetchOutcome::Loaded(_)
		));
		scheduler.advance(3_500.0);
		assert!(matches!(
			block_on(cache.fetch(&"g".into(), false)).unwrap(),
			FetchOutcome::Loaded(_)
		));
		assert_eq!(api.call_count("graph_data"), 3);
	}

	#[test]
	fn slow_response_for_previous_graph_is_discarded() {
		let api = MockApi::new();
		api.set_data("a", payload());
		api.set_data("b", json!({"nodes": [{"id": "x"}], "links": []}));
		let release_a = api.gate_data("a");
		let scheduler = TestScheduler::new();
		let cache = cache(api, scheduler.clone());

		cache.set_active(Some("a".into()));
		let outcome = Rc::new(RefCell::new(None));
		let (task_cache, task_outcome) = (cache.clone(), outcome.clone());
		let mut pool = futures::executor::LocalPool::new();
		pool.spawner()
			.spawn_local(async move {
				*task_outcome.borrow_mut() = Some(task_cache.fetch(&"a".into(), false).await);
			})
			.unwrap();
		pool.run_until_stalled();
		assert!(outcome.borrow().is_none());

		cache.set_active(Some("b".into()));
		block_on(cache.fetch(&"b".into(), false)).unwrap();

		release_a.send(()).unwrap();
		pool.run_until_stalled();

		assert_eq!(
			outcome.borrow_mut().take().unwrap().unwrap(),
			FetchOutcome::Superseded
		);
		let data = cache.data();
		assert_eq!(data.nodes.len(), 1);
		assert_eq!(data.nodes[0].id, "x");
	}

	#[test]
	fn mistyped_fields_still_render() {
		let api = MockApi::new();
		api.set_data(
			"g",
			json!({
				"nodes": [{"id": 1, "name": "Cell"}, {"id": 2, "name": 42}, {"id": 3, "is_merged": "true"}],
				"links": [{"source": 1, "target": 3, "confidence": "high"}]
			}),
		);
		let cache = cache(api, TestScheduler::new());
		cache.set_active(Some("g".into()));
		assert!(matches!(
			block_on(cache.fetch(&"g".into(), false)).unwrap(),
			FetchOutcome::Loaded(_)
		));
		let data = cache.data();
		assert_eq!(data.nodes.len(), 3);
		assert_eq!(data.node("2").unwrap().name, "42");
		assert!(data.node("3").unwrap().is_merged);
		assert_eq!(data.links.len(), 1);
		assert_eq!(data.links[0].confidence, None);
	}

	#[test]
	fn inactive_graph_is_not_fetched() {
		let api = MockApi::new();
		let cache = cache(api.clone(), TestScheduler::new());
		assert_eq!(
			block_on(cache.fetch(&"g".into(), false)).unwrap(),
			FetchOutcome::Superseded
		);
		assert_eq!(api.call_count("graph_data"), 0);
	}
}
