//! Knowledge graph workspace: catalog, builds and an interactive concept map.

use leptos::prelude::*;
use leptos_meta::*;
use leptos_router::components::*;
use leptos_router::path;
use log::{Level, info, warn};

// Modules
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod scheduler;
#[cfg(test)]
mod testing;

mod components;
mod pages;

// Top-Level pages
use crate::config::EngineConfig;
use crate::pages::home::Home;
use crate::pages::not_found::NotFound;

/// Id of the `<script type="application/json">` element holding the config.
const CONFIG_ELEMENT_ID: &str = "engine-config";

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("Logging initialized");
}

/// Read the engine config embedded in the page, or fall back to defaults.
pub fn load_config() -> EngineConfig {
	let text = web_sys::window()
		.and_then(|w| w.document())
		.and_then(|d| d.get_element_by_id(CONFIG_ELEMENT_ID))
		.and_then(|el| el.text_content());
	let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
		info!("no #{CONFIG_ELEMENT_ID} element, using default config");
		return EngineConfig::default();
	};
	match EngineConfig::from_json(&text) {
		Ok(config) => config,
		Err(err) => {
			warn!("ignoring invalid engine config: {err}");
			EngineConfig::default()
		}
	}
}

/// An app router which renders the workspace and handles 404's
#[component]
pub fn App() -> impl IntoView {
	// Provides context that manages stylesheets, titles, meta tags, etc.
	provide_meta_context();

	view! {
		<Html attr:lang="en" attr:dir="ltr" attr:data-theme="dark" />

		// sets the document title
		<Title text="Concept Graph" />

		// injects metadata in the <head> of the page
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<Router>
			<Routes fallback=|| view! { <NotFound /> }>
				<Route path=path!("/") view=Home />
			</Routes>
		</Router>
	}
}
