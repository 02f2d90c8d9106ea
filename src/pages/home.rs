use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::warn;

use crate::api::HttpGraphApi;
use crate::components::bindings::bind;
use crate::components::force_graph::{ConceptMapCanvas, MapClick};
use crate::components::panels::{
	BuildPanel, CatalogPanel, NodeDetailsPanel, NoticeBanner, SearchBox, SuggestionsPanel,
};
use crate::engine::Workspace;
use crate::load_config;
use crate::scheduler::BrowserScheduler;

/// Concept map workspace: graph list, canvas and side panels.
#[component]
pub fn Home() -> impl IntoView {
	let config = load_config();
	let api = Rc::new(HttpGraphApi::new(&config));
	let workspace = Workspace::new(config.clone(), api, Rc::new(BrowserScheduler));
	let ui = bind(workspace.clone());

	let shutdown = workspace.shutdown_token();
	on_cleanup(move || shutdown.cancel());

	spawn_local(async move {
		if let Err(err) = workspace.start().await {
			warn!("initial graph listing failed: {err}");
		}
	});

	let (clicks, set_clicks) = signal(None::<MapClick>);
	Effect::new(move |_| match clicks.get() {
		Some(MapClick::Node(id)) => ui.focus_node(&id),
		Some(MapClick::Background) => ui.ws().deselect_node(),
		None => {}
	});

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>
			<div class="workspace">
				<aside class="sidebar">
					<CatalogPanel ui=ui />
					<BuildPanel ui=ui />
					<SuggestionsPanel ui=ui />
				</aside>
				<main class="map">
					<NoticeBanner ui=ui />
					<SearchBox ui=ui />
					<ConceptMapCanvas
						data=ui.data
						focus=ui.focus
						camera=ui.camera
						clicks=set_clicks
						layout=config.layout
						render_config=config.render
					/>
				</main>
				<aside class="details-column">
					<NodeDetailsPanel ui=ui />
				</aside>
			</div>
		</ErrorBoundary>
	}
}
