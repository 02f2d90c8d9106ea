use leptos::prelude::*;
use leptos::task::spawn_local;

use super::parse_limit;
use crate::components::bindings::UiState;
use crate::engine::build_phase;
use crate::events::BuildPhase;
use crate::model::{BuildMode, BuildRequest, GraphStatus, SourceMode};

fn phase_text(phase: &BuildPhase) -> String {
	match phase {
		BuildPhase::Running { progress, step } => match step {
			Some(step) => format!("Building {progress:.0}% ({step})"),
			None => format!("Building {progress:.0}%"),
		},
		BuildPhase::Paused { progress, reason } => {
			format!("Paused at {progress:.0}%: {reason}. Polling continues.")
		}
		BuildPhase::Finished(GraphStatus::Ready) => "Ready".to_string(),
		BuildPhase::Finished(GraphStatus::Error) => "Build failed".to_string(),
		BuildPhase::Finished(status) => status.as_str().to_string(),
	}
}

/// The dialog can be opened during a build to follow it closely.
fn open_label(building: bool) -> &'static str {
	if building { "Build progress…" } else { "Build…" }
}

/// Build status of the selected graph and the build dialog.
#[component]
pub fn BuildPanel(ui: UiState) -> impl IntoView {
	let modal = RwSignal::new(false);
	let submitting = RwSignal::new(false);
	let build_mode = RwSignal::new(BuildMode::Existing);
	let source_mode = RwSignal::new(SourceMode::Filtered);
	let max_chars = RwSignal::new(String::new());
	let chunk = RwSignal::new(String::new());

	let building = move || {
		ui.selected_graph()
			.is_some_and(|g| g.status == GraphStatus::Building)
	};
	let failure = move || {
		ui.selected_graph()
			.filter(|g| g.status == GraphStatus::Error)
			.map(|g| {
				g.error_message
					.unwrap_or_else(|| "The build failed without a message".to_string())
			})
	};

	let set_modal = move |open: bool| {
		modal.set(open);
		ui.ws().builds().set_modal_open(open);
	};

	let start = move |_| {
		let Some(graph) = untrack(|| ui.selected_graph()) else {
			return;
		};
		let overrides = parse_limit("extraction_max_chars", &max_chars.get_untracked())
			.and_then(|m| Ok((m, parse_limit("chunk_size", &chunk.get_untracked())?)));
		let (extraction_max_chars, chunk_size) = match overrides {
			Ok(overrides) => overrides,
			Err(err) => {
				ui.notice.set(Some(err.to_notice()));
				return;
			}
		};
		let request = BuildRequest {
			build_mode: build_mode.get_untracked(),
			source_mode: source_mode.get_untracked(),
			extraction_max_chars,
			chunk_size,
		};
		submitting.set(true);
		// The dialog stays open and shows live progress; polling runs at the
		// tighter cadence until the user closes it.
		spawn_local(async move {
			let _ = ui.ws().trigger_build(&graph.id, &request).await;
			submitting.set(false);
		});
	};

	let status_line = move || {
		ui.selected_graph()
			.map(|graph| {
				let phase = build_phase(&graph);
				let active = matches!(phase, BuildPhase::Running { .. } | BuildPhase::Paused { .. });
				let progress = graph.progress();
				view! {
					<div class=format!("build-status status-{}", graph.status.as_str())>
						<span>{phase_text(&phase)}</span>
						{active.then(|| view! { <progress max="100" value=progress></progress> })}
					</div>
				}
			})
	};

	view! {
		<section class="panel build">
			{status_line}
			{move || failure().map(|message| view! { <div class="notice notice-failure" role="alert">{message}</div> })}
			<Show when=move || ui.selected.get().is_some()>
				<button on:click=move |_| set_modal(true)>{move || open_label(building())}</button>
			</Show>
			<Show when=move || modal.get()>
				<div class="modal">
					<h3>"Build graph"</h3>
					{status_line}
					<fieldset>
						<legend>"Mode"</legend>
						<label>
							<input
								type="radio"
								name="build-mode"
								prop:checked=move || build_mode.get() == BuildMode::Existing
								on:change=move |_| build_mode.set(BuildMode::Existing)
							/>
							"Update with new documents"
						</label>
						<label>
							<input
								type="radio"
								name="build-mode"
								prop:checked=move || build_mode.get() == BuildMode::Rebuild
								on:change=move |_| build_mode.set(BuildMode::Rebuild)
							/>
							"Rebuild from scratch"
						</label>
					</fieldset>
					<label>
						<input
							type="checkbox"
							prop:checked=move || source_mode.get() == SourceMode::Raw
							on:change=move |ev| {
								source_mode.set(if event_target_checked(&ev) { SourceMode::Raw } else { SourceMode::Filtered })
							}
						/>
						"Use raw text"
					</label>
					<label>
						"Extraction budget override"
						<input
							type="number"
							prop:value=move || max_chars.get()
							on:input=move |ev| max_chars.set(event_target_value(&ev))
						/>
					</label>
					<label>
						"Chunk size override"
						<input
							type="number"
							prop:value=move || chunk.get()
							on:input=move |ev| chunk.set(event_target_value(&ev))
						/>
					</label>
					<div class="actions">
						<button disabled=move || building() || submitting.get() on:click=start>
							{move || if submitting.get() { "Starting…" } else { "Start build" }}
						</button>
						<button on:click=move |_| set_modal(false)>"Close"</button>
					</div>
				</div>
			</Show>
		</section>
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn paused_text_says_polling_continues() {
		let text = phase_text(&BuildPhase::Paused {
			progress: 42.4,
			reason: "rate_limited".into(),
		});
		assert!(text.contains("42%"));
		assert!(text.contains("rate_limited"));
		assert!(text.contains("Polling continues"));
	}

	#[test]
	fn dialog_opens_while_building() {
		assert_eq!(open_label(true), "Build progress…");
		assert_eq!(open_label(false), "Build…");
	}

	#[test]
	fn running_text_shows_step() {
		let text = phase_text(&BuildPhase::Running {
			progress: 10.0,
			step: Some("extracting".into()),
		});
		assert_eq!(text, "Building 10% (extracting)");
		assert_eq!(phase_text(&BuildPhase::Finished(GraphStatus::Ready)), "Ready");
	}
}
