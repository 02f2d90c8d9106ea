use leptos::prelude::*;

/// 404 Not Found Page
#[component]
pub fn NotFound() -> impl IntoView {
	view! {
		<div class="not-found">
			<h1>"Nothing here"</h1>
			<a href="/">"Back to the concept map"</a>
		</div>
	}
}
