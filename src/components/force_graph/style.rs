//! Per-node and per-link paint decisions, kept free of canvas calls.

use crate::config::RenderConfig;
use crate::engine::Focus;
use crate::model::{Link, Node, NodeStatus, Relationship};

pub const BACKGROUND: &str = "#0f172a";
/// Radius per unit of `sqrt(val)`.
pub const NODE_REL_SIZE: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
	pub fn rgba(&self, alpha: f64) -> String {
		format!("rgba({}, {}, {}, {:.3})", self.0, self.1, self.2, alpha.clamp(0.0, 1.0))
	}
}

/// Core fill, halo and outline of one node treatment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
	pub core: Rgb,
	pub glow: Rgb,
	pub stroke: Rgb,
}

const MERGED: Palette = Palette {
	core: Rgb(192, 132, 252),
	glow: Rgb(216, 180, 254),
	stroke: Rgb(233, 213, 255),
};
const COMPLETED: Palette = Palette {
	core: Rgb(52, 211, 153),
	glow: Rgb(110, 231, 183),
	stroke: Rgb(167, 243, 208),
};
const IN_PROGRESS: Palette = Palette {
	core: Rgb(251, 191, 36),
	glow: Rgb(252, 211, 77),
	stroke: Rgb(253, 230, 138),
};
const UNLOCKED: Palette = Palette {
	core: Rgb(96, 165, 250),
	glow: Rgb(147, 197, 253),
	stroke: Rgb(191, 219, 254),
};
const LOCKED: Palette = Palette {
	core: Rgb(71, 85, 105),
	glow: Rgb(148, 163, 184),
	stroke: Rgb(100, 116, 139),
};

pub const INTRA_LINK: Rgb = Rgb(148, 163, 184);
pub const CROSS_LINK: Rgb = Rgb(244, 114, 182);
pub const EMPHASIS_LINK: Rgb = Rgb(226, 232, 240);
pub const LABEL: Rgb = Rgb(241, 245, 249);

/// Merged styling wins over status.
pub fn palette(node: &Node) -> Palette {
	if node.is_merged {
		return MERGED;
	}
	match node.status {
		NodeStatus::Completed => COMPLETED,
		NodeStatus::InProgress => IN_PROGRESS,
		NodeStatus::Unlocked => UNLOCKED,
		NodeStatus::Locked => LOCKED,
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeStyle {
	pub palette: Palette,
	pub radius: f64,
	pub alpha: f64,
	/// Halo radius, `None` when the node has no glow.
	pub glow: Option<f64>,
	pub show_label: bool,
	pub selected: bool,
}

pub fn node_style(node: &Node, focus: &Focus, zoom: f64, config: &RenderConfig) -> NodeStyle {
	let selected = focus.is_selected(&node.id);
	let locked = node.status == NodeStatus::Locked && !node.is_merged;
	let base_radius = NODE_REL_SIZE * node.val.max(1.0).sqrt();
	let radius = if selected { base_radius * 1.3 } else { base_radius };

	let mut alpha = if locked { 0.6 } else { 1.0 };
	let in_context = selected || focus.is_neighbor(&node.id);
	if focus.node().is_some() && !in_context {
		alpha *= config.dim_opacity;
	}

	let glow = if selected {
		Some(radius * 2.4)
	} else if locked {
		None
	} else {
		Some(radius * 1.8)
	};

	NodeStyle {
		palette: palette(node),
		radius,
		alpha,
		glow,
		show_label: selected || zoom > config.label_zoom_threshold || node.is_important(),
		selected,
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkStyle {
	pub color: Rgb,
	pub alpha: f64,
	pub width: f64,
	pub particles: usize,
}

pub fn link_style(link: &Link, focus: &Focus, config: &RenderConfig) -> LinkStyle {
	let cross = link.relationship == Relationship::CrossGraph;
	let emphasized = focus.node().is_some_and(|n| link.touches(n));
	let color = match (cross, emphasized) {
		(true, _) => CROSS_LINK,
		(false, true) => EMPHASIS_LINK,
		(false, false) => INTRA_LINK,
	};
	let (alpha, width) = match (emphasized, focus.node().is_some()) {
		(true, _) => (0.95, 2.2),
		(false, true) => (0.35 * config.dim_opacity, 0.8),
		(false, false) if cross => (0.8, 1.4),
		(false, false) => (0.35, 0.8),
	};
	LinkStyle {
		color,
		alpha,
		width,
		particles: if emphasized { config.flow_particles } else { 0 },
	}
}

/// Ease-out used by camera moves.
pub fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(3)
}
