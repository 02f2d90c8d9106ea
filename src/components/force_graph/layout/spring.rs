use std::collections::HashMap;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};

use super::{LayoutEngine, link_indices, seed_positions};
use crate::components::force_graph::types::Point;
use crate::model::{GraphData, NodeId};

/// Mean per-tick displacement below which the layout counts as settled.
const REST_DISPLACEMENT: f64 = 0.02;

fn parameters() -> SimulationParameters {
	SimulationParameters {
		force_charge: 150.0,
		force_spring: 0.05,
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	}
}

/// Spring-electrical model from the `force_graph` crate.
///
/// The crate only exposes nodes through visitors, so positions are copied
/// into an index-aligned buffer after every step.
pub struct SpringLayout {
	graph: ForceGraph<usize, ()>,
	handles: Vec<DefaultNodeIdx>,
	positions: Vec<Point>,
	settled: bool,
}

impl SpringLayout {
	pub fn new() -> Self {
		Self {
			graph: ForceGraph::new(parameters()),
			handles: Vec::new(),
			positions: Vec::new(),
			settled: true,
		}
	}

	fn sync(&mut self) -> f64 {
		let mut moved = 0.0;
		let positions = &mut self.positions;
		self.graph.visit_nodes(|node| {
			let p = Point::new(node.x() as f64, node.y() as f64);
			if let Some(slot) = positions.get_mut(node.data.user_data) {
				moved += slot.distance(&p);
				*slot = p;
			}
		});
		moved
	}
}

impl Default for SpringLayout {
	fn default() -> Self {
		Self::new()
	}
}

impl LayoutEngine for SpringLayout {
	fn load(&mut self, data: &GraphData, previous: &HashMap<NodeId, Point>) {
		let mut graph = ForceGraph::new(parameters());
		let seeds = seed_positions(data, previous);
		self.handles = seeds
			.iter()
			.enumerate()
			.map(|(i, p)| {
				graph.add_node(NodeData {
					x: p.x as f32,
					y: p.y as f32,
					mass: 10.0,
					is_anchor: false,
					user_data: i,
				})
			})
			.collect();
		for (s, t) in link_indices(data) {
			if s != t {
				graph.add_edge(self.handles[s], self.handles[t], EdgeData::default());
			}
		}
		self.graph = graph;
		self.positions = seeds;
		self.settled = self.positions.is_empty();
	}

	fn tick(&mut self, dt: f64) {
		if self.settled {
			return;
		}
		self.graph.update(dt as f32);
		let moved = self.sync();
		self.settled = moved / (self.positions.len().max(1) as f64) < REST_DISPLACEMENT;
	}

	fn is_settled(&self) -> bool {
		self.settled
	}

	fn positions(&self) -> &[Point] {
		&self.positions
	}

	fn pin(&mut self, index: usize, at: Point) {
		let Some(&handle) = self.handles.get(index) else {
			return;
		};
		self.graph.visit_nodes_mut(|node| {
			if node.index() == handle {
				node.data.x = at.x as f32;
				node.data.y = at.y as f32;
				node.data.is_anchor = true;
			}
		});
		self.positions[index] = at;
	}

	fn reheat(&mut self) {
		self.settled = self.positions.is_empty();
	}
}

#[cfg(test)]
mod tests {
	use super::super::tests::chain;
	use super::*;

	#[test]
	fn positions_follow_node_order() {
		let mut layout = SpringLayout::new();
		let data = chain(4);
		let previous = HashMap::from([("2".to_string(), Point::new(50.0, 50.0))]);
		layout.load(&data, &previous);
		assert_eq!(layout.positions().len(), 4);
		assert_eq!(layout.positions()[2], Point::new(50.0, 50.0));
		assert!(!layout.is_settled());
	}

	#[test]
	fn anchored_node_does_not_move() {
		let mut layout = SpringLayout::new();
		layout.load(&chain(4), &HashMap::new());
		layout.pin(1, Point::new(-80.0, 20.0));
		for _ in 0..30 {
			layout.tick(1.0 / 60.0);
		}
		assert_eq!(layout.positions()[1], Point::new(-80.0, 20.0));
	}

	#[test]
	fn empty_graph_is_settled() {
		let mut layout = SpringLayout::new();
		layout.load(&GraphData::default(), &HashMap::new());
		assert!(layout.is_settled());
	}
}
