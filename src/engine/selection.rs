//! Focused node, its neighborhood and node search.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, info};

use crate::events::{EventBus, WorkspaceEvent};
use crate::model::{GraphData, Link, NodeId, NodeStatus};

/// Camera request for the renderer.
#[derive(Clone, Debug, PartialEq)]
pub enum CameraCommand {
	/// Frame every node.
	FitAll,
	/// Center on one node at the given zoom.
	CenterOn {
		/// Node to center.
		node: NodeId,
		/// Target zoom scale.
		zoom: f64,
	},
}

/// Selection state.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Focus {
	/// Nothing selected.
	#[default]
	Idle,
	/// One node selected.
	Focused {
		/// Selected node.
		node: NodeId,
		/// Nodes sharing a link with it.
		neighbors: HashSet<NodeId>,
	},
}

impl Focus {
	/// Selected node, if any.
	pub fn node(&self) -> Option<&NodeId> {
		match self {
			Self::Idle => None,
			Self::Focused { node, .. } => Some(node),
		}
	}

	/// `id` is the selected node.
	pub fn is_selected(&self, id: &str) -> bool {
		self.node().is_some_and(|n| n == id)
	}

	/// `id` shares a link with the selected node.
	pub fn is_neighbor(&self, id: &str) -> bool {
		match self {
			Self::Idle => false,
			Self::Focused { neighbors, .. } => neighbors.contains(id),
		}
	}
}

/// Neighbors of `node`, from a full scan of `links`.
pub fn neighbors_of(node: &str, links: &[Link]) -> HashSet<NodeId> {
	links
		.iter()
		.filter_map(|l| {
			if l.source == node {
				Some(l.target.clone())
			} else if l.target == node {
				Some(l.source.clone())
			} else {
				None
			}
		})
		.collect()
}

/// One node search result.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
	/// Node id.
	pub id: NodeId,
	/// Node name.
	pub name: String,
}

/// Neighbor row of the details panel.
#[derive(Clone, Debug, PartialEq)]
pub struct NeighborInfo {
	/// Node id.
	pub id: NodeId,
	/// Node name.
	pub name: String,
	/// The connecting link crosses graphs.
	pub cross_graph: bool,
}

/// Everything the details panel shows about the focused node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDetails {
	/// Node id.
	pub id: NodeId,
	/// Node name.
	pub name: String,
	/// Optional summary.
	pub description: Option<String>,
	/// Learning status.
	pub status: NodeStatus,
	/// Produced by cross-graph merging.
	pub is_merged: bool,
	/// Linked nodes, sorted by name.
	pub neighbors: Vec<NeighborInfo>,
}

/// Tracks the single focused node.
pub struct SelectionFocusController {
	bus: Rc<EventBus<WorkspaceEvent>>,
	focus_zoom: f64,
	state: RefCell<Focus>,
}

impl SelectionFocusController {
	/// Controller in `Idle`.
	pub fn new(bus: Rc<EventBus<WorkspaceEvent>>, focus_zoom: f64) -> Self {
		Self {
			bus,
			focus_zoom,
			state: RefCell::new(Focus::Idle),
		}
	}

	/// Current state.
	pub fn focus(&self) -> Focus {
		self.state.borrow().clone()
	}

	/// Focus `node_id` after a click or search pick.
	///
	/// Returns the camera framing for the node, or `None` if it is not in `data`.
	pub fn focus_node(&self, node_id: &str, data: &GraphData) -> Option<CameraCommand> {
		if data.node(node_id).is_none() {
			debug!("ignoring focus on unknown node {node_id}");
			return None;
		}
		let neighbors = neighbors_of(node_id, &data.links);
		info!("focused {node_id} ({} neighbors)", neighbors.len());
		*self.state.borrow_mut() = Focus::Focused {
			node: node_id.to_string(),
			neighbors,
		};
		self.bus
			.emit(&WorkspaceEvent::FocusChanged(Some(node_id.to_string())));
		Some(CameraCommand::CenterOn {
			node: node_id.to_string(),
			zoom: self.focus_zoom,
		})
	}

	/// Back to `Idle`.
	pub fn deselect(&self) {
		let was_focused = {
			let mut state = self.state.borrow_mut();
			let was = *state != Focus::Idle;
			*state = Focus::Idle;
			was
		};
		if was_focused {
			debug!("focus cleared");
			self.bus.emit(&WorkspaceEvent::FocusChanged(None));
		}
	}

	/// Data was replaced: drop the focus if its node vanished, else recompute neighbors.
	pub fn revalidate(&self, data: &GraphData) {
		let Some(node) = self.state.borrow().node().cloned() else {
			return;
		};
		if data.node(&node).is_none() {
			self.deselect();
			return;
		}
		let neighbors = neighbors_of(&node, &data.links);
		*self.state.borrow_mut() = Focus::Focused { node, neighbors };
	}

	/// Nodes whose name contains `query`, prefix matches first.
	pub fn search(&self, query: &str, data: &GraphData, limit: usize) -> Vec<SearchHit> {
		let query = query.trim().to_lowercase();
		if query.is_empty() {
			return Vec::new();
		}
		let mut hits: Vec<(bool, String, &str)> = data
			.nodes
			.iter()
			.filter_map(|n| {
				let lower = n.name.to_lowercase();
				lower
					.find(&query)
					.map(|pos| (pos != 0, lower, n.id.as_str()))
			})
			.collect();
		hits.sort();
		hits.into_iter()
			.take(limit)
			.filter_map(|(_, _, id)| {
				data.node(id).map(|n| SearchHit {
					id: n.id.clone(),
					name: n.name.clone(),
				})
			})
			.collect()
	}

	/// Details of the focused node.
	pub fn details(&self, data: &GraphData) -> Option<NodeDetails> {
		let state = self.state.borrow();
		let Focus::Focused { node, neighbors } = &*state else {
			return None;
		};
		let focused = data.node(node)?;
		let mut rows: Vec<NeighborInfo> = neighbors
			.iter()
			.filter_map(|id| data.node(id))
			.map(|n| NeighborInfo {
				id: n.id.clone(),
				name: n.name.clone(),
				cross_graph: data.links.iter().any(|l| {
					l.relationship == crate::model::Relationship::CrossGraph
						&& l.touches(node)
						&& l.touches(&n.id)
				}),
			})
			.collect();
		rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
		Some(NodeDetails {
			id: focused.id.clone(),
			name: focused.name.clone(),
			description: focused.description.clone(),
			status: focused.status,
			is_merged: focused.is_merged,
			neighbors: rows,
		})
	}
}
