use std::collections::HashMap;
use std::sync::Arc;

use super::layout::LayoutEngine;
use super::style::{NODE_REL_SIZE, ease_out_cubic};
use super::types::{MapClick, Point, ViewTransform};
use crate::config::RenderConfig;
use crate::engine::{CameraCommand, Focus};
use crate::model::{GraphData, NodeId};

/// Extra pick radius around a node, in screen pixels.
pub const HIT_SLOP: f64 = 4.0;
/// Pointer travel that turns a press into a drag.
const CLICK_TOLERANCE: f64 = 4.0;
const FIT_PADDING: f64 = 40.0;
/// Frames the layout runs before the automatic fit.
const FIT_DELAY_FRAMES: u32 = 45;
/// Seconds a camera move takes.
const CAMERA_DURATION: f64 = 0.6;
pub const MIN_ZOOM: f64 = 0.05;
pub const MAX_ZOOM: f64 = 10.0;

#[derive(Clone, Copy, Debug, Default)]
pub struct DragState {
	pub node: Option<usize>,
	pub start: Point,
	pub moved: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start: Point,
	pub transform_start: Point,
	pub moved: bool,
}

#[derive(Clone, Copy, Debug)]
struct CameraMove {
	from: ViewTransform,
	to: ViewTransform,
	t: f64,
}

/// Everything the canvas needs between frames.
pub struct ConceptMapState {
	data: Arc<GraphData>,
	index: HashMap<NodeId, usize>,
	layout: Box<dyn LayoutEngine>,
	pub config: RenderConfig,
	pub transform: ViewTransform,
	camera: Option<CameraMove>,
	fit_countdown: Option<u32>,
	pub focus: Focus,
	pub hover: Option<usize>,
	pub drag: DragState,
	pub pan: PanState,
	pub width: f64,
	pub height: f64,
	pub flow_time: f64,
}

impl ConceptMapState {
	pub fn new(layout: Box<dyn LayoutEngine>, config: RenderConfig, width: f64, height: f64) -> Self {
		Self {
			data: Arc::new(GraphData::default()),
			index: HashMap::new(),
			layout,
			config,
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			camera: None,
			fit_countdown: None,
			focus: Focus::Idle,
			hover: None,
			drag: DragState::default(),
			pan: PanState::default(),
			width,
			height,
			flow_time: 0.0,
		}
	}

	pub fn data(&self) -> &GraphData {
		&self.data
	}

	pub fn positions(&self) -> &[Point] {
		self.layout.positions()
	}

	pub fn position_of(&self, id: &str) -> Option<Point> {
		self.index
			.get(id)
			.and_then(|&i| self.layout.positions().get(i).copied())
	}

	/// Replace the rendered graph. Surviving nodes keep their positions; the
	/// camera fits once the node set goes from empty to non-empty.
	pub fn set_data(&mut self, data: Arc<GraphData>) {
		if Arc::ptr_eq(&self.data, &data) {
			return;
		}
		let previous: HashMap<NodeId, Point> = self
			.data
			.nodes
			.iter()
			.zip(self.layout.positions())
			.map(|(n, p)| (n.id.clone(), *p))
			.collect();
		let was_empty = self.data.is_empty();

		self.layout.load(&data, &previous);
		self.index = data
			.nodes
			.iter()
			.enumerate()
			.map(|(i, n)| (n.id.clone(), i))
			.collect();
		self.hover = None;
		self.drag = DragState::default();
		self.data = data;

		if self.data.is_empty() {
			self.fit_countdown = None;
		} else if was_empty {
			self.fit_countdown = Some(FIT_DELAY_FRAMES);
		}
	}

	pub fn set_focus(&mut self, focus: Focus) {
		self.focus = focus;
	}

	pub fn fit_pending(&self) -> bool {
		self.fit_countdown.is_some()
	}

	pub fn is_animating_camera(&self) -> bool {
		self.camera.is_some()
	}

	/// Start easing toward the framing `command` describes. An explicit
	/// command replaces a pending automatic fit.
	pub fn apply_camera(&mut self, command: &CameraCommand) {
		self.fit_countdown = None;
		let target = match command {
			CameraCommand::FitAll => self.fit_transform(),
			CameraCommand::CenterOn { node, zoom } => self.position_of(node).map(|p| {
				let k = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
				ViewTransform {
					x: self.width / 2.0 - p.x * k,
					y: self.height / 2.0 - p.y * k,
					k,
				}
			}),
		};
		if let Some(to) = target {
			self.camera = Some(CameraMove {
				from: self.transform,
				to,
				t: 0.0,
			});
		}
	}

	/// Transform that frames every node, `None` without nodes.
	pub fn fit_transform(&self) -> Option<ViewTransform> {
		let positions = self.layout.positions();
		let first = positions.first()?;
		let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
		for p in positions {
			min_x = min_x.min(p.x);
			min_y = min_y.min(p.y);
			max_x = max_x.max(p.x);
			max_y = max_y.max(p.y);
		}
		let (bw, bh) = ((max_x - min_x).max(1.0), (max_y - min_y).max(1.0));
		let avail_w = (self.width - 2.0 * FIT_PADDING).max(1.0);
		let avail_h = (self.height - 2.0 * FIT_PADDING).max(1.0);
		let k = (avail_w / bw).min(avail_h / bh).clamp(MIN_ZOOM, 4.0);
		let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
		Some(ViewTransform {
			x: self.width / 2.0 - cx * k,
			y: self.height / 2.0 - cy * k,
			k,
		})
	}

	pub fn tick(&mut self, dt: f64) {
		self.layout.tick(dt);
		self.flow_time += dt;

		if let Some(frames) = self.fit_countdown {
			if frames == 0 || self.layout.is_settled() {
				self.apply_camera(&CameraCommand::FitAll);
			} else {
				self.fit_countdown = Some(frames - 1);
			}
		}

		if let Some(mut camera) = self.camera {
			camera.t = (camera.t + dt / CAMERA_DURATION).min(1.0);
			self.transform = camera.from.lerp(&camera.to, ease_out_cubic(camera.t));
			self.camera = if camera.t >= 1.0 || self.transform.is_close(&camera.to) {
				self.transform = camera.to;
				None
			} else {
				Some(camera)
			};
		}
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> Point {
		Point::new(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// Topmost node under the screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<usize> {
		let p = self.screen_to_graph(sx, sy);
		let slop = HIT_SLOP / self.transform.k;
		self.layout
			.positions()
			.iter()
			.zip(&self.data.nodes)
			.enumerate()
			.rev()
			.find(|(_, (pos, node))| pos.distance(&p) <= NODE_REL_SIZE * node.val.max(1.0).sqrt() + slop)
			.map(|(i, _)| i)
	}

	pub fn pointer_down(&mut self, sx: f64, sy: f64) {
		let start = Point::new(sx, sy);
		match self.node_at_position(sx, sy) {
			Some(i) => {
				self.drag = DragState {
					node: Some(i),
					start,
					moved: false,
				};
			}
			None => {
				self.pan = PanState {
					active: true,
					start,
					transform_start: Point::new(self.transform.x, self.transform.y),
					moved: false,
				};
			}
		}
	}

	pub fn pointer_move(&mut self, sx: f64, sy: f64) {
		let here = Point::new(sx, sy);
		if let Some(i) = self.drag.node {
			if !self.drag.moved && here.distance(&self.drag.start) < CLICK_TOLERANCE {
				return;
			}
			if !self.drag.moved {
				self.drag.moved = true;
				self.layout.reheat();
			}
			let at = self.screen_to_graph(sx, sy);
			self.layout.pin(i, at);
		} else if self.pan.active {
			if here.distance(&self.pan.start) >= CLICK_TOLERANCE {
				self.pan.moved = true;
				self.camera = None;
				self.fit_countdown = None;
			}
			if self.pan.moved {
				self.transform.x = self.pan.transform_start.x + (sx - self.pan.start.x);
				self.transform.y = self.pan.transform_start.y + (sy - self.pan.start.y);
			}
		} else {
			self.hover = self.node_at_position(sx, sy);
		}
	}

	/// End a press. A press that barely moved is a click.
	pub fn pointer_up(&mut self) -> Option<MapClick> {
		let click = if let Some(i) = self.drag.node {
			self.data
				.nodes
				.get(i)
				.filter(|_| !self.drag.moved)
				.map(|n| MapClick::Node(n.id.clone()))
		} else if self.pan.active {
			(!self.pan.moved).then_some(MapClick::Background)
		} else {
			None
		};
		self.drag = DragState::default();
		self.pan = PanState::default();
		click
	}

	pub fn pointer_leave(&mut self) {
		self.drag = DragState::default();
		self.pan = PanState::default();
		self.hover = None;
	}

	/// Zoom by `factor` keeping the screen point fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
		self.camera = None;
		self.fit_countdown = None;
		let k = (self.transform.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		let ratio = k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = k;
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

#[cfg(test)]
mod tests {
	use super::super::layout::ForceSimulation;
	use super::*;
	use crate::config::LayoutConfig;
	use crate::model::{Link, Node, NodeStatus, Relationship};

	fn data(ids: &[&str]) -> Arc<GraphData> {
		let nodes = ids
			.iter()
			.map(|id| Node {
				id: id.to_string(),
				name: id.to_string(),
				description: None,
				status: NodeStatus::Unlocked,
				is_merged: false,
				val: 4.0,
			})
			.collect();
		let links = ids
			.windows(2)
			.map(|w| Link {
				source: w[0].to_string(),
				target: w[1].to_string(),
				relationship: Relationship::IntraGraph,
				confidence: None,
			})
			.collect();
		Arc::new(GraphData { nodes, links })
	}

	fn state() -> ConceptMapState {
		ConceptMapState::new(
			Box::new(ForceSimulation::new(LayoutConfig::default())),
			RenderConfig::default(),
			800.0,
			600.0,
		)
	}

	fn run(state: &mut ConceptMapState, frames: usize) {
		for _ in 0..frames {
			state.tick(1.0 / 60.0);
		}
	}

	fn screen_of(state: &ConceptMapState, id: &str) -> (f64, f64) {
		let p = state.position_of(id).unwrap();
		(
			p.x * state.transform.k + state.transform.x,
			p.y * state.transform.k + state.transform.y,
		)
	}

	#[test]
	fn first_load_fits_and_reload_does_not() {
		let mut state = state();
		state.set_data(data(&["a", "b", "c"]));
		assert!(state.fit_pending());
		run(&mut state, 200);
		assert!(!state.fit_pending());
		assert!(!state.is_animating_camera());

		state.set_data(data(&["a", "b", "c", "d"]));
		assert!(!state.fit_pending());

		state.set_data(Arc::new(GraphData::default()));
		state.set_data(data(&["x"]));
		assert!(state.fit_pending());
	}

	#[test]
	fn reload_keeps_surviving_positions() {
		let mut state = state();
		state.set_data(data(&["a", "b", "c"]));
		run(&mut state, 30);
		let before = state.position_of("b").unwrap();
		state.set_data(data(&["a", "b", "c", "d"]));
		assert_eq!(state.position_of("b").unwrap(), before);
	}

	#[test]
	fn center_on_eases_to_the_node() {
		let mut state = state();
		state.set_data(data(&["a", "b"]));
		state.apply_camera(&CameraCommand::CenterOn {
			node: "b".into(),
			zoom: 2.5,
		});
		let target = state.position_of("b").unwrap();
		state.tick(1.0 / 60.0);
		assert!(state.is_animating_camera());
		assert!(state.transform.k < 2.5);

		// Freeze the layout so the target does not drift.
		let mut frozen = state;
		frozen.layout.pin(1, target);
		run(&mut frozen, 60);
		assert!(!frozen.is_animating_camera());
		assert_eq!(frozen.transform.k, 2.5);
		let (sx, sy) = screen_of(&frozen, "b");
		assert!((sx - 400.0).abs() < 1e-6 && (sy - 300.0).abs() < 1e-6);
	}

	#[test]
	fn unknown_center_target_is_ignored() {
		let mut state = state();
		state.set_data(data(&["a"]));
		state.apply_camera(&CameraCommand::CenterOn {
			node: "zz".into(),
			zoom: 2.0,
		});
		assert!(!state.is_animating_camera());
	}

	#[test]
	fn click_on_node_and_background() {
		let mut state = state();
		state.set_data(data(&["a", "b"]));
		let (sx, sy) = screen_of(&state, "a");
		state.pointer_down(sx, sy);
		assert_eq!(state.pointer_up(), Some(MapClick::Node("a".into())));

		state.pointer_down(5.0, 5.0);
		assert_eq!(state.pointer_up(), Some(MapClick::Background));
	}

	#[test]
	fn dragging_pins_instead_of_clicking() {
		let mut state = state();
		state.set_data(data(&["a", "b"]));
		let (sx, sy) = screen_of(&state, "a");
		state.pointer_down(sx, sy);
		state.pointer_move(sx + 40.0, sy + 10.0);
		assert_eq!(state.pointer_up(), None);
		let pinned = state.position_of("a").unwrap();
		run(&mut state, 20);
		assert_eq!(state.position_of("a").unwrap(), pinned);
	}

	#[test]
	fn panning_moves_the_view() {
		let mut state = state();
		state.pointer_down(10.0, 10.0);
		state.pointer_move(60.0, 30.0);
		assert_eq!(state.pointer_up(), None);
		assert_eq!(state.transform.x, 450.0);
		assert_eq!(state.transform.y, 320.0);
	}

	#[test]
	fn zoom_keeps_anchor_point() {
		let mut state = state();
		let before = state.screen_to_graph(100.0, 80.0);
		state.zoom_at(100.0, 80.0, 1.5);
		let after = state.screen_to_graph(100.0, 80.0);
		assert!(before.distance(&after) < 1e-9);
		state.zoom_at(0.0, 0.0, 1e6);
		assert_eq!(state.transform.k, MAX_ZOOM);
	}
}
