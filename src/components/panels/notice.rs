use leptos::prelude::*;

use crate::components::bindings::UiState;
use crate::error::ErrorKind;

fn kind_class(kind: ErrorKind) -> &'static str {
	match kind {
		ErrorKind::Validation => "notice notice-validation",
		ErrorKind::Transient => "notice notice-transient",
		ErrorKind::JobFailure => "notice notice-failure",
	}
}

/// Toast for validation and transient errors.
///
/// Build failures are shown by the build panel from the graph record.
#[component]
pub fn NoticeBanner(ui: UiState) -> impl IntoView {
	let visible = move || ui.notice.get().filter(|n| n.kind != ErrorKind::JobFailure);

	move || {
		visible().map(|notice| {
			let dismissible = notice.dismissible;
			view! {
				<div class=kind_class(notice.kind) role="alert">
					<span>{notice.message}</span>
					<Show when=move || dismissible>
						<button class="dismiss" on:click=move |_| ui.notice.set(None)>"×"</button>
					</Show>
				</div>
			}
		})
	}
}
