use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use leptos::prelude::*;
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent};

use super::layout::engine_for;
use super::render;
use super::state::ConceptMapState;
use super::types::MapClick;
use crate::config::{LayoutConfig, RenderConfig};
use crate::engine::{CameraCommand, Focus};
use crate::model::GraphData;
use crate::scheduler::CancelToken;

type SharedState = Rc<RefCell<Option<ConceptMapState>>>;

fn parent_size(canvas: &HtmlCanvasElement) -> (f64, f64) {
	canvas
		.parent_element()
		.map(|p| (p.client_width() as f64, p.client_height() as f64))
		.filter(|&(w, h)| w > 0.0 && h > 0.0)
		.unwrap_or((800.0, 600.0))
}

fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?;
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

fn with_state(state: &SharedState, f: impl FnOnce(&mut ConceptMapState)) {
	if let Some(s) = state.borrow_mut().as_mut() {
		f(s);
	}
}

/// Canvas view of the loaded concept graph.
///
/// Clicks are reported through `clicks`; the owner turns them into focus
/// changes and feeds the result back through `focus` and `camera`.
#[component]
pub fn ConceptMapCanvas(
	#[prop(into)] data: Signal<Arc<GraphData>>,
	#[prop(into)] focus: Signal<Focus>,
	#[prop(into)] camera: Signal<Option<CameraCommand>>,
	clicks: WriteSignal<Option<MapClick>>,
	#[prop(optional)] layout: LayoutConfig,
	#[prop(optional)] render_config: RenderConfig,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let stop = CancelToken::new();

	{
		let stop = stop.clone();
		on_cleanup(move || stop.cancel());
	}

	let (state_init, animate_init, resize_init, stop_init) =
		(state.clone(), animate.clone(), resize_cb.clone(), stop.clone());
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if state_init.borrow().is_some() {
			return;
		}
		let Some(window) = web_sys::window() else {
			return;
		};
		let ctx = match canvas.get_context("2d") {
			Ok(Some(ctx)) => ctx.dyn_into::<CanvasRenderingContext2d>(),
			_ => {
				warn!("canvas has no 2d context");
				return;
			}
		};
		let Ok(ctx) = ctx else {
			warn!("2d context has an unexpected type");
			return;
		};

		let (w, h) = parent_size(&canvas);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);
		let mut initial = ConceptMapState::new(engine_for(&layout), render_config.clone(), w, h);
		initial.set_data(data.get_untracked());
		initial.set_focus(focus.get_untracked());
		*state_init.borrow_mut() = Some(initial);
		debug!("concept map canvas {w}x{h}");

		let (state_resize, canvas_resize, stop_resize) =
			(state_init.clone(), canvas.clone(), stop_init.clone());
		*resize_init.borrow_mut() = Some(Closure::new(move || {
			if stop_resize.is_cancelled() {
				return;
			}
			let (nw, nh) = parent_size(&canvas_resize);
			canvas_resize.set_width(nw as u32);
			canvas_resize.set_height(nh as u32);
			with_state(&state_resize, |s| s.resize(nw, nh));
		}));
		if let Some(ref cb) = *resize_init.borrow() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (state_anim, animate_inner, stop_anim) =
			(state_init.clone(), animate_init.clone(), stop_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if stop_anim.is_cancelled() {
				debug!("concept map animation stopped");
				return;
			}
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				s.tick(1.0 / 60.0);
				render::render(s, &ctx);
			}
			if let Some(ref cb) = *animate_inner.borrow()
				&& let Some(window) = web_sys::window()
			{
				let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let state_data = state.clone();
	Effect::new(move |_| {
		let next = data.get();
		with_state(&state_data, |s| s.set_data(next));
	});

	let state_focus = state.clone();
	Effect::new(move |_| {
		let next = focus.get();
		with_state(&state_focus, |s| s.set_focus(next));
	});

	let state_camera = state.clone();
	Effect::new(move |_| {
		if let Some(command) = camera.get() {
			with_state(&state_camera, |s| s.apply_camera(&command));
		}
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		if let Some((x, y)) = local_point(canvas_ref, &ev) {
			with_state(&state_md, |s| s.pointer_down(x, y));
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		if let Some((x, y)) = local_point(canvas_ref, &ev) {
			with_state(&state_mm, |s| s.pointer_move(x, y));
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| {
		let mut click = None;
		with_state(&state_mu, |s| click = s.pointer_up());
		if let Some(click) = click {
			clicks.set(Some(click));
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		with_state(&state_ml, |s| s.pointer_leave());
	};

	let state_wh = state;
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		if let Some((x, y)) = local_point(canvas_ref, &ev) {
			let factor = if ev.delta_y() > 0.0 { 0.9 } else { 1.1 };
			with_state(&state_wh, |s| s.zoom_at(x, y, factor));
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="concept-map-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
