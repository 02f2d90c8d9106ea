//! Physics backends for the concept map.
//!
//! Positions are index-aligned with `GraphData::nodes`. Painting and
//! selection only read positions, so a backend can be swapped without
//! touching them.

mod simulation;
mod spring;

use std::collections::HashMap;
use std::f64::consts::PI;

pub use simulation::ForceSimulation;
pub use spring::SpringLayout;

use super::types::Point;
use crate::config::{LayoutConfig, LayoutEngineKind};
use crate::model::{GraphData, NodeId};

/// Upper bound on ticks for [`LayoutEngine::compute_layout`].
pub const MAX_SETTLE_TICKS: usize = 600;

/// A pluggable layout algorithm.
pub trait LayoutEngine {
	/// Replace the topology. Nodes found in `previous` keep their position.
	fn load(&mut self, data: &GraphData, previous: &HashMap<NodeId, Point>);

	/// Advance by `dt` seconds.
	fn tick(&mut self, dt: f64);

	/// Motion has died down.
	fn is_settled(&self) -> bool;

	fn positions(&self) -> &[Point];

	/// Fix node `index` at `at` until the next load.
	fn pin(&mut self, index: usize, at: Point);

	/// Restart motion after an interaction.
	fn reheat(&mut self);

	/// Run `data` to rest from scratch and return the final positions.
	fn compute_layout(&mut self, data: &GraphData) -> Vec<Point> {
		self.load(data, &HashMap::new());
		let mut ticks = 0;
		while !self.is_settled() && ticks < MAX_SETTLE_TICKS {
			self.tick(1.0 / 60.0);
			ticks += 1;
		}
		self.positions().to_vec()
	}
}

/// Build the backend named by `config`.
pub fn engine_for(config: &LayoutConfig) -> Box<dyn LayoutEngine> {
	match config.engine {
		LayoutEngineKind::Force => Box::new(ForceSimulation::new(config.clone())),
		LayoutEngineKind::Spring => Box::new(SpringLayout::new()),
	}
}

const INITIAL_RADIUS: f64 = 10.0;

/// Phyllotaxis seed position of the `i`th node.
pub(crate) fn seed_position(i: usize) -> Point {
	let angle = PI * (3.0 - 5f64.sqrt());
	let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
	let a = i as f64 * angle;
	Point::new(radius * a.cos(), radius * a.sin())
}

/// Seed positions for `data`: survivors keep theirs, newcomers start beside a
/// surviving neighbor when they have one.
pub(crate) fn seed_positions(data: &GraphData, previous: &HashMap<NodeId, Point>) -> Vec<Point> {
	let index = data.index();
	let mut placed: Vec<Option<Point>> = data
		.nodes
		.iter()
		.map(|n| previous.get(&n.id).copied())
		.collect();

	for (i, node) in data.nodes.iter().enumerate() {
		if placed[i].is_some() {
			continue;
		}
		let anchor = data
			.links
			.iter()
			.filter(|l| l.touches(&node.id))
			.filter_map(|l| {
				let other = if l.source == node.id { &l.target } else { &l.source };
				index.get(other.as_str()).and_then(|&j| previous.get(&data.nodes[j].id))
			})
			.next()
			.copied();
		let offset = seed_position(i);
		placed[i] = Some(match anchor {
			Some(p) => Point::new(p.x + offset.x * 0.1, p.y + offset.y * 0.1),
			None => offset,
		});
	}
	placed.into_iter().map(Option::unwrap_or_default).collect()
}

/// Link endpoints as node indices.
pub(crate) fn link_indices(data: &GraphData) -> Vec<(usize, usize)> {
	let index = data.index();
	data.links
		.iter()
		.filter_map(|l| Some((*index.get(l.source.as_str())?, *index.get(l.target.as_str())?)))
		.collect()
}
