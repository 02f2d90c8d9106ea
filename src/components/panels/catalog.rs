use leptos::prelude::*;
use leptos::task::spawn_local;

use super::parse_limit;
use crate::components::bindings::UiState;
use crate::model::{DocumentId, DocumentRef, Graph, GraphConfig, GraphId};

#[derive(Clone, Debug, PartialEq)]
enum FormMode {
	Create,
	Edit(GraphId),
}

/// Graph list with create, edit and delete.
#[component]
pub fn CatalogPanel(ui: UiState) -> impl IntoView {
	let form = RwSignal::new(None::<FormMode>);
	let name = RwSignal::new(String::new());
	let description = RwSignal::new(String::new());
	let doc_ids = RwSignal::new(Vec::<DocumentId>::new());
	let max_chars = RwSignal::new(String::new());
	let chunk = RwSignal::new(String::new());
	let documents = RwSignal::new(Vec::<DocumentRef>::new());
	let saving = RwSignal::new(false);

	let open_form = move |mode: FormMode| {
		let config = match &mode {
			FormMode::Create => GraphConfig::default(),
			FormMode::Edit(id) => ui
				.graphs
				.with_untracked(|gs| gs.iter().find(|g| &g.id == id).map(GraphConfig::from_graph))
				.unwrap_or_default(),
		};
		name.set(config.name);
		description.set(config.description);
		doc_ids.set(config.document_ids);
		max_chars.set(config.extraction_max_chars.map(|v| v.to_string()).unwrap_or_default());
		chunk.set(config.chunk_size.map(|v| v.to_string()).unwrap_or_default());
		form.set(Some(mode));
		spawn_local(async move {
			if let Ok(docs) = ui.ws().list_documents().await {
				documents.set(docs);
			}
		});
	};

	let submit = move |_| {
		let Some(mode) = form.get_untracked() else {
			return;
		};
		let limits = parse_limit("extraction_max_chars", &max_chars.get_untracked())
			.and_then(|m| Ok((m, parse_limit("chunk_size", &chunk.get_untracked())?)));
		let (extraction_max_chars, chunk_size) = match limits {
			Ok(limits) => limits,
			Err(err) => {
				ui.notice.set(Some(err.to_notice()));
				return;
			}
		};
		let config = GraphConfig {
			name: name.get_untracked(),
			description: description.get_untracked(),
			document_ids: doc_ids.get_untracked(),
			extraction_max_chars,
			chunk_size,
		};
		saving.set(true);
		spawn_local(async move {
			let ws = ui.ws();
			let result = match &mode {
				FormMode::Create => ws.create_graph(&config).await,
				FormMode::Edit(id) => ws.update_graph(id, &config).await,
			};
			saving.set(false);
			if result.is_ok() {
				form.set(None);
			}
		});
	};

	let toggle_doc = move |id: DocumentId| {
		doc_ids.update(|ids| match ids.iter().position(|d| *d == id) {
			Some(pos) => {
				ids.remove(pos);
			}
			None => ids.push(id),
		});
	};

	let delete_selected = move |_| {
		let Some(id) = ui.selected.get_untracked() else {
			return;
		};
		spawn_local(async move {
			let _ = ui.ws().delete_graph(&id).await;
		});
	};

	view! {
		<section class="panel catalog">
			<header>
				<h2>"Graphs"</h2>
				<button on:click=move |_| open_form(FormMode::Create)>"New graph"</button>
			</header>
			<ul class="graph-list">
				<For
					each=move || ui.graphs.get()
					key=|g: &Graph| (g.id.clone(), g.name.clone(), g.status, g.node_count)
					children=move |g: Graph| {
						let id = g.id.clone();
						let select_id = g.id.clone();
						view! {
							<li
								class:selected=move || ui.selected.get().as_ref() == Some(&id)
								on:click=move |_| {
									ui.ws().select_graph(Some(select_id.clone()));
								}
							>
								<span class="graph-name">{g.name.clone()}</span>
								<span class=format!("status status-{}", g.status.as_str())>
									{g.status.as_str()}
								</span>
								<span class="node-count">{format!("{} concepts", g.node_count)}</span>
							</li>
						}
					}
				/>
			</ul>
			<Show when=move || ui.selected.get().is_some()>
				<div class="actions">
					<button on:click=move |_| {
						if let Some(id) = ui.selected.get_untracked() {
							open_form(FormMode::Edit(id));
						}
					}>"Edit"</button>
					<button class="danger" on:click=delete_selected>"Delete"</button>
				</div>
			</Show>
			<Show when=move || form.get().is_some()>
				<form class="graph-form" on:submit=move |ev| ev.prevent_default()>
					<h3>
						{move || match form.get() {
							Some(FormMode::Edit(_)) => "Edit graph",
							_ => "New graph",
						}}
					</h3>
					<label>
						"Name"
						<input
							type="text"
							prop:value=move || name.get()
							on:input=move |ev| name.set(event_target_value(&ev))
						/>
					</label>
					<label>
						"Description"
						<textarea
							prop:value=move || description.get()
							on:input=move |ev| description.set(event_target_value(&ev))
						></textarea>
					</label>
					<fieldset class="documents">
						<legend>"Documents"</legend>
						<For
							each=move || documents.get()
							key=|d: &DocumentRef| d.id.clone()
							children=move |d: DocumentRef| {
								let checked_id = d.id.clone();
								let toggle_id = d.id.clone();
								view! {
									<label>
										<input
											type="checkbox"
											prop:checked=move || doc_ids.with(|ids| ids.contains(&checked_id))
											on:change=move |_| toggle_doc(toggle_id.clone())
										/>
										{d.name.clone()}
									</label>
								}
							}
						/>
					</fieldset>
					<label>
						"Extraction budget (chars)"
						<input
							type="number"
							prop:value=move || max_chars.get()
							on:input=move |ev| max_chars.set(event_target_value(&ev))
						/>
					</label>
					<label>
						"Chunk size"
						<input
							type="number"
							prop:value=move || chunk.get()
							on:input=move |ev| chunk.set(event_target_value(&ev))
						/>
					</label>
					<div class="actions">
						<button type="button" disabled=move || saving.get() on:click=submit>
							"Save"
						</button>
						<button type="button" on:click=move |_| form.set(None)>"Cancel"</button>
					</div>
				</form>
			</Show>
		</section>
	}
}
