use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use super::state::ConceptMapState;
use super::style::{BACKGROUND, LABEL, NodeStyle, link_style, node_style};
use super::types::Point;
use crate::model::Node;

/// Layout units a flow particle travels per second.
const PARTICLE_SPEED: f64 = 0.6;

pub fn render(state: &ConceptMapState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_links(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
}

fn draw_links(state: &ConceptMapState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let data = state.data();
	let index = data.index();
	let positions = state.positions();

	for link in &data.links {
		let (Some(&s), Some(&t)) = (index.get(link.source.as_str()), index.get(link.target.as_str()))
		else {
			continue;
		};
		let (Some(a), Some(b)) = (positions.get(s), positions.get(t)) else {
			continue;
		};
		let style = link_style(link, &state.focus, &state.config);
		let (dx, dy) = (b.x - a.x, b.y - a.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}

		ctx.set_stroke_style_str(&style.color.rgba(style.alpha));
		ctx.set_line_width(style.width / k);
		ctx.begin_path();
		ctx.move_to(a.x, a.y);
		ctx.line_to(b.x, b.y);
		ctx.stroke();

		if style.particles > 0 {
			draw_particles(ctx, a, b, style.particles, state.flow_time, &style.color.rgba(1.0), k);
		}
	}
}

/// Evenly spaced dots moving from source to target.
fn draw_particles(
	ctx: &CanvasRenderingContext2d,
	a: &Point,
	b: &Point,
	count: usize,
	time: f64,
	color: &str,
	k: f64,
) {
	ctx.set_fill_style_str(color);
	let radius = 2.0 / k.max(0.5);
	for i in 0..count {
		let t = (time * PARTICLE_SPEED + i as f64 / count as f64).fract();
		let (x, y) = (a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
		ctx.begin_path();
		let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
		ctx.fill();
	}
}

fn draw_nodes(state: &ConceptMapState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let positions = state.positions();
	let mut selected = None;

	for (i, node) in state.data().nodes.iter().enumerate() {
		let Some(p) = positions.get(i) else {
			continue;
		};
		let mut style = node_style(node, &state.focus, k, &state.config);
		if state.hover == Some(i) {
			style.show_label = true;
		}
		// The focused node goes last so nothing covers it.
		if style.selected {
			selected = Some((node, *p, style));
			continue;
		}
		paint_node(ctx, node, p, &style, k);
	}
	if let Some((node, p, style)) = selected {
		paint_node(ctx, node, &p, &style, k);
	}
}

/// Paint one node: halo, core, outline and label.
pub fn paint_node(ctx: &CanvasRenderingContext2d, node: &Node, p: &Point, style: &NodeStyle, k: f64) {
	let (x, y) = (p.x, p.y);
	ctx.set_global_alpha(style.alpha);

	if let Some(glow_radius) = style.glow
		&& let Ok(gradient) = ctx.create_radial_gradient(x, y, style.radius * 0.3, x, y, glow_radius)
	{
		let glow = style.palette.glow;
		let strength = if style.selected { 0.55 } else { 0.3 };
		let _ = gradient.add_color_stop(0.0, &glow.rgba(strength));
		let _ = gradient.add_color_stop(0.6, &glow.rgba(strength * 0.3));
		let _ = gradient.add_color_stop(1.0, &glow.rgba(0.0));
		ctx.begin_path();
		let _ = ctx.arc(x, y, glow_radius, 0.0, 2.0 * PI);
		#[allow(deprecated)]
		ctx.set_fill_style(&gradient);
		ctx.fill();
	}

	ctx.begin_path();
	let _ = ctx.arc(x, y, style.radius, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(&style.palette.core.rgba(1.0));
	ctx.fill();
	ctx.set_stroke_style_str(&style.palette.stroke.rgba(1.0));
	ctx.set_line_width(if style.selected { 2.0 / k } else { 1.0 / k });
	ctx.stroke();

	if style.selected {
		ctx.begin_path();
		let _ = ctx.arc(x, y, style.radius + 3.0 / k, 0.0, 2.0 * PI);
		ctx.set_stroke_style_str(&LABEL.rgba(0.8));
		ctx.set_line_width(1.5 / k);
		ctx.stroke();
	}

	if style.show_label {
		let size = if style.selected { 13.0 } else { 10.0 };
		ctx.set_fill_style_str(&LABEL.rgba(0.9));
		ctx.set_font(&format!("{}px sans-serif", size / k.max(0.5)));
		let _ = ctx.fill_text(&node.name, x + style.radius + 3.0 / k, y + 3.0 / k);
	}
	ctx.set_global_alpha(1.0);
}
