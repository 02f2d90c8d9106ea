use leptos::prelude::*;

use crate::components::bindings::UiState;
use crate::engine::{CameraCommand, NeighborInfo, SearchHit};

const SEARCH_LIMIT: usize = 8;

/// Name search over the rendered nodes.
#[component]
pub fn SearchBox(ui: UiState) -> impl IntoView {
	let query = RwSignal::new(String::new());
	let hits = Memo::new(move |_| {
		let q = query.get();
		// Re-run when new data arrives.
		ui.data.track();
		if q.trim().is_empty() {
			Vec::new()
		} else {
			ui.ws().search(&q, SEARCH_LIMIT)
		}
	});

	view! {
		<div class="search">
			<input
				type="search"
				placeholder="Find a concept"
				prop:value=move || query.get()
				on:input=move |ev| query.set(event_target_value(&ev))
			/>
			<ul class="hits">
				<For
					each=move || hits.get()
					key=|hit: &SearchHit| hit.id.clone()
					children=move |hit: SearchHit| {
						let id = hit.id.clone();
						view! {
							<li on:click=move |_| {
								ui.focus_node(&id);
								query.set(String::new());
							}>{hit.name}</li>
						}
					}
				/>
			</ul>
		</div>
	}
}

/// Focused node with its neighbors and camera controls.
#[component]
pub fn NodeDetailsPanel(ui: UiState) -> impl IntoView {
	let fit = move |_| ui.camera.set(Some(CameraCommand::FitAll));

	view! {
		<section class="panel details">
			<div class="camera-controls">
				<button on:click=fit>"Fit all"</button>
				<Show when=move || ui.details.get().is_some()>
					<button on:click=move |_| ui.ws().deselect_node()>"Clear focus"</button>
				</Show>
			</div>
			{move || {
				ui.details
					.get()
					.map(|d| {
						let connected = format!("Connected ({})", d.neighbors.len());
						view! {
							<h2>{d.name}</h2>
							<p class="meta">
								{d.status.label()}
								{d.is_merged.then_some(" · merged")}
							</p>
							{d.description.map(|text| view! { <p class="description">{text}</p> })}
							<h3>{connected}</h3>
							<ul class="neighbors">
								{d
									.neighbors
									.into_iter()
									.map(|n: NeighborInfo| {
										let id = n.id.clone();
										view! {
											<li class=("cross-graph", n.cross_graph) on:click=move |_| ui.focus_node(&id)>
												{n.name}
											</li>
										}
									})
									.collect_view()}
							</ul>
						}
					})
			}}
		</section>
	}
}
