use std::collections::HashMap;

use super::{LayoutEngine, link_indices, seed_positions};
use crate::components::force_graph::types::Point;
use crate::config::LayoutConfig;
use crate::model::{GraphData, NodeId};

const ALPHA_TARGET: f64 = 0.0;
/// Alpha reached again after a drag or a reload that kept most nodes.
const REHEAT_ALPHA: f64 = 0.3;
const MIN_DISTANCE_SQ: f64 = 1.0;

#[derive(Clone, Copy, Debug, Default)]
struct Body {
	pos: Point,
	vx: f64,
	vy: f64,
	pinned: bool,
}

struct Spring {
	source: usize,
	target: usize,
	strength: f64,
	bias: f64,
}

/// Velocity Verlet simulation with charge, link and center forces.
///
/// Alpha cools geometrically from 1 to `alpha_min` in about 300 ticks;
/// every force is scaled by it.
pub struct ForceSimulation {
	config: LayoutConfig,
	bodies: Vec<Body>,
	springs: Vec<Spring>,
	positions: Vec<Point>,
	alpha: f64,
	alpha_decay: f64,
}

impl ForceSimulation {
	pub fn new(config: LayoutConfig) -> Self {
		let alpha_decay = 1.0 - config.alpha_min.powf(1.0 / 300.0);
		Self {
			config,
			bodies: Vec::new(),
			springs: Vec::new(),
			positions: Vec::new(),
			alpha: 1.0,
			alpha_decay,
		}
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	fn apply_links(&mut self) {
		let distance = self.config.link_distance;
		for spring in &self.springs {
			if spring.source == spring.target {
				continue;
			}
			let (s, t) = (self.bodies[spring.source], self.bodies[spring.target]);
			let mut dx = t.pos.x + t.vx - s.pos.x - s.vx;
			let mut dy = t.pos.y + t.vy - s.pos.y - s.vy;
			if dx == 0.0 && dy == 0.0 {
				dx = jiggle(spring.source);
				dy = jiggle(spring.target);
			}
			let l = (dx * dx + dy * dy).sqrt();
			let f = (l - distance) / l * self.alpha * spring.strength;
			let (fx, fy) = (dx * f, dy * f);
			let target = &mut self.bodies[spring.target];
			target.vx -= fx * spring.bias;
			target.vy -= fy * spring.bias;
			let source = &mut self.bodies[spring.source];
			source.vx += fx * (1.0 - spring.bias);
			source.vy += fy * (1.0 - spring.bias);
		}
	}

	fn apply_charge(&mut self) {
		let strength = self.config.charge_strength * self.alpha;
		let n = self.bodies.len();
		for i in 0..n {
			for j in i + 1..n {
				let (a, b) = (self.bodies[i].pos, self.bodies[j].pos);
				let mut dx = b.x - a.x;
				let mut dy = b.y - a.y;
				if dx == 0.0 && dy == 0.0 {
					dx = jiggle(i);
					dy = jiggle(j);
				}
				let mut l2 = dx * dx + dy * dy;
				if l2 < MIN_DISTANCE_SQ {
					l2 = (MIN_DISTANCE_SQ * l2).sqrt();
				}
				let w = strength / l2;
				self.bodies[i].vx += dx * w;
				self.bodies[i].vy += dy * w;
				self.bodies[j].vx -= dx * w;
				self.bodies[j].vy -= dy * w;
			}
		}
	}

	/// Shift the free bodies so their centroid moves toward the origin.
	fn apply_center(&mut self) {
		let free: Vec<usize> = (0..self.bodies.len())
			.filter(|&i| !self.bodies[i].pinned)
			.collect();
		if free.is_empty() {
			return;
		}
		let n = free.len() as f64;
		let (sx, sy) = free.iter().fold((0.0, 0.0), |(sx, sy), &i| {
			(sx + self.bodies[i].pos.x, sy + self.bodies[i].pos.y)
		});
		let (cx, cy) = (sx / n * self.config.center_strength, sy / n * self.config.center_strength);
		for i in free {
			self.bodies[i].pos.x -= cx;
			self.bodies[i].pos.y -= cy;
		}
	}

	fn integrate(&mut self) {
		let keep = 1.0 - self.config.velocity_decay;
		for body in &mut self.bodies {
			if body.pinned {
				body.vx = 0.0;
				body.vy = 0.0;
				continue;
			}
			body.vx *= keep;
			body.vy *= keep;
			body.pos.x += body.vx;
			body.pos.y += body.vy;
		}
	}
}

fn jiggle(seed: usize) -> f64 {
	((seed % 7) as f64 + 1.0) * 1e-6
}

impl LayoutEngine for ForceSimulation {
	fn load(&mut self, data: &GraphData, previous: &HashMap<NodeId, Point>) {
		let survivors = data
			.nodes
			.iter()
			.filter(|n| previous.contains_key(&n.id))
			.count();
		self.bodies = seed_positions(data, previous)
			.into_iter()
			.map(|pos| Body {
				pos,
				..Body::default()
			})
			.collect();

		let links = link_indices(data);
		let mut count = vec![0usize; self.bodies.len()];
		for &(s, t) in &links {
			count[s] += 1;
			count[t] += 1;
		}
		self.springs = links
			.into_iter()
			.map(|(source, target)| {
				let (cs, ct) = (count[source] as f64, count[target] as f64);
				Spring {
					source,
					target,
					strength: 1.0 / cs.min(ct).max(1.0),
					bias: cs / (cs + ct),
				}
			})
			.collect();
		self.positions = self.bodies.iter().map(|b| b.pos).collect();

		// Mostly unchanged graphs only need a gentle settle.
		self.alpha = if !self.bodies.is_empty() && survivors * 2 >= self.bodies.len() {
			REHEAT_ALPHA
		} else {
			1.0
		};
	}

	fn tick(&mut self, _dt: f64) {
		if self.is_settled() {
			return;
		}
		self.alpha += (ALPHA_TARGET - self.alpha) * self.alpha_decay;
		self.apply_links();
		self.apply_charge();
		self.integrate();
		self.apply_center();
		for (p, b) in self.positions.iter_mut().zip(&self.bodies) {
			*p = b.pos;
		}
	}

	fn is_settled(&self) -> bool {
		self.alpha < self.config.alpha_min
	}

	fn positions(&self) -> &[Point] {
		&self.positions
	}

	fn pin(&mut self, index: usize, at: Point) {
		if let Some(body) = self.bodies.get_mut(index) {
			body.pos = at;
			body.pinned = true;
			body.vx = 0.0;
			body.vy = 0.0;
			self.positions[index] = at;
		}
	}

	fn reheat(&mut self) {
		self.alpha = self.alpha.max(REHEAT_ALPHA);
	}
}
