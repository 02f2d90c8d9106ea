use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::components::bindings::UiState;
use crate::model::{ConnectionSuggestion, Graph, GraphId};

/// Graphs the selected one can be connected to.
fn targets(graphs: &[Graph], source: Option<&GraphId>) -> Vec<(GraphId, String)> {
	graphs
		.iter()
		.filter(|g| Some(&g.id) != source)
		.map(|g| (g.id.clone(), g.name.clone()))
		.collect()
}

/// Suggest, curate and save cross-graph links.
#[component]
pub fn SuggestionsPanel(ui: UiState) -> impl IntoView {
	let target = RwSignal::new(None::<GraphId>);
	let context = RwSignal::new(String::new());
	let loading = RwSignal::new(false);
	let saving = RwSignal::new(false);
	let show_cross = RwSignal::new(false);

	// A new source graph starts a fresh round.
	Effect::new(move |_| {
		ui.selected.track();
		target.set(None);
		show_cross.set(false);
	});

	let suggest = move |_| {
		let target_id = target.get_untracked();
		let context_text = context.get_untracked();
		loading.set(true);
		spawn_local(async move {
			let _ = ui.ws().suggest(target_id.as_ref(), &context_text).await;
			loading.set(false);
		});
	};

	let save = move |_| {
		saving.set(true);
		spawn_local(async move {
			let ws = ui.ws();
			if ws.save_suggestions().await.is_ok() {
				show_cross.set(ws.cache().cross_links().0);
			}
			saving.set(false);
		});
	};

	let toggle_cross = move |ev: leptos::ev::Event| {
		let include = event_target_checked(&ev);
		show_cross.set(include);
		ui.ws().set_cross_links(include, target.get_untracked());
	};

	let selected_count = move || {
		ui.session
			.with(|s| s.as_ref().map_or(0, |s| s.suggestions.iter().filter(|c| c.selected).count()))
	};
	let has_candidates = move || ui.session.with(|s| s.as_ref().is_some_and(|s| !s.suggestions.is_empty()));

	view! {
		<Show when=move || ui.selected.get().is_some()>
			<section class="panel suggestions">
				<h2>"Connect graphs"</h2>
				<label>
					"Target graph"
					<select on:change=move |ev| {
						let value = event_target_value(&ev);
						target.set((!value.is_empty()).then_some(value));
					}>
						<option value="" selected=move || target.get().is_none()>"Choose…"</option>
						{move || {
							let source = ui.selected.get();
							targets(&ui.graphs.get(), source.as_ref())
								.into_iter()
								.map(|(id, name)| {
									let option_id = id.clone();
									view! {
										<option
											value=id
											selected=move || target.get().as_ref() == Some(&option_id)
										>
											{name}
										</option>
									}
								})
								.collect_view()
						}}
					</select>
				</label>
				<label>
					"How do they relate?"
					<textarea
						prop:value=move || context.get()
						on:input=move |ev| context.set(event_target_value(&ev))
					></textarea>
				</label>
				<button disabled=move || loading.get() on:click=suggest>
					{move || if loading.get() { "Thinking…" } else { "Suggest links" }}
				</button>
				<Show when=has_candidates>
					<div class="bulk">
						<button on:click=move |_| ui.ws().suggestions().set_all(true)>"All"</button>
						<button on:click=move |_| ui.ws().suggestions().set_all(false)>"None"</button>
						<span>{move || format!("{} selected", selected_count())}</span>
					</div>
				</Show>
				<ul class="suggestion-list">
					{move || {
						ui.session
							.get()
							.map(|s| s.suggestions)
							.unwrap_or_default()
							.into_iter()
							.enumerate()
							.map(|(i, s): (usize, ConnectionSuggestion)| {
								view! {
									<li>
										<label>
											<input
												type="checkbox"
												prop:checked=s.selected
												on:change=move |_| ui.ws().suggestions().toggle(i)
											/>
											<span class="pair">
												{format!("{} → {}", s.from_scoped_id, s.to_scoped_id)}
											</span>
											<span class="confidence">{format!("{:.0}%", s.confidence * 100.0)}</span>
										</label>
										<p class="rationale">{s.rationale}</p>
									</li>
								}
							})
							.collect_view()
					}}
				</ul>
				<button disabled=move || saving.get() || selected_count() == 0 on:click=save>
					{move || if saving.get() { "Saving…" } else { "Save selected" }}
				</button>
				<label class="cross-links">
					<input type="checkbox" prop:checked=move || show_cross.get() on:change=toggle_cross />
					"Show cross-graph links"
				</label>
			</section>
		</Show>
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn source_graph_is_not_a_target() {
		let graphs = vec![
			Graph {
				id: "g1".into(),
				name: "Biology Core".into(),
				..Graph::default()
			},
			Graph {
				id: "g2".into(),
				name: "Chemistry".into(),
				..Graph::default()
			},
		];
		let source = "g1".to_string();
		assert_eq!(
			targets(&graphs, Some(&source)),
			vec![("g2".to_string(), "Chemistry".to_string())]
		);
		assert_eq!(targets(&graphs, None).len(), 2);
	}
}
