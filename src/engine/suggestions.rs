//! Cross-graph connection suggestions and their curation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info};

use super::report;
use crate::api::{GraphApi, SaveConnectionsRequest, SuggestRequest};
use crate::error::{GraphError, Result};
use crate::events::{EventBus, WorkspaceEvent};
use crate::model::{ConnectionSuggestion, GraphId};

/// How saved connections were produced.
pub const SAVE_METHOD: &str = "llm";

/// One suggest/curate/save round.
#[derive(Clone, Debug, PartialEq)]
pub struct SuggestionSession {
	/// Graph the links start from.
	pub source: GraphId,
	/// Graph the links end in.
	pub target: GraphId,
	/// Why the graphs connect.
	pub context: String,
	/// Candidates, each with its checkbox state.
	pub suggestions: Vec<ConnectionSuggestion>,
}

impl SuggestionSession {
	/// Checked candidates.
	pub fn selected(&self) -> Vec<ConnectionSuggestion> {
		self.suggestions
			.iter()
			.filter(|s| s.selected)
			.cloned()
			.collect()
	}
}

fn validate(source: &str, target: Option<&GraphId>, context: &str) -> Result<GraphId> {
	let target = target
		.map(|t| t.trim())
		.filter(|t| !t.is_empty())
		.ok_or_else(|| GraphError::validation("Choose a graph to connect to"))?;
	if target == source {
		return Err(GraphError::validation("Pick a different graph to connect to"));
	}
	if context.trim().is_empty() {
		return Err(GraphError::validation(
			"Describe how the two graphs relate before asking for suggestions",
		));
	}
	Ok(target.to_string())
}

/// Requests and curates candidate cross-graph links.
pub struct ConnectionSuggestionEngine {
	api: Rc<dyn GraphApi>,
	bus: Rc<EventBus<WorkspaceEvent>>,
	max_links: u32,
	session: RefCell<Option<SuggestionSession>>,
	loading: Cell<bool>,
	/// Bumped by every request and every clear; a response only lands if it
	/// still matches.
	generation: Cell<u64>,
}

impl ConnectionSuggestionEngine {
	/// Engine with no session.
	pub fn new(api: Rc<dyn GraphApi>, bus: Rc<EventBus<WorkspaceEvent>>, max_links: u32) -> Self {
		Self {
			api,
			bus,
			max_links,
			session: RefCell::new(None),
			loading: Cell::new(false),
			generation: Cell::new(0),
		}
	}

	/// A request is outstanding.
	pub fn is_loading(&self) -> bool {
		self.loading.get()
	}

	/// Current session.
	pub fn session(&self) -> Option<SuggestionSession> {
		self.session.borrow().clone()
	}

	/// Ask the backend for candidate links. Every returned candidate starts checked.
	pub async fn suggest(
		&self,
		source: &GraphId,
		target: Option<&GraphId>,
		context: &str,
	) -> Result<Vec<ConnectionSuggestion>> {
		let target = validate(source, target, context).map_err(|e| report(&self.bus, e))?;
		let request = SuggestRequest {
			target_graph_id: target.clone(),
			context: context.trim().to_string(),
			max_links: self.max_links,
		};

		let generation = self.generation.get() + 1;
		self.generation.set(generation);
		self.loading.set(true);
		let result = self.api.suggest_connections(source, &request).await;
		if self.generation.get() != generation {
			debug!("discarding stale suggestions {source} -> {target}");
			return Ok(Vec::new());
		}
		self.loading.set(false);
		let mut suggestions = result.map_err(|e| report(&self.bus, e))?;

		for suggestion in &mut suggestions {
			suggestion.selected = true;
		}
		info!(
			"{} connection suggestions {source} -> {target}",
			suggestions.len()
		);
		*self.session.borrow_mut() = Some(SuggestionSession {
			source: source.clone(),
			target,
			context: request.context,
			suggestions: suggestions.clone(),
		});
		self.bus.emit(&WorkspaceEvent::SuggestionsChanged);
		Ok(suggestions)
	}

	/// Flip one checkbox.
	pub fn toggle(&self, index: usize) {
		let changed = {
			let mut session = self.session.borrow_mut();
			match session.as_mut().and_then(|s| s.suggestions.get_mut(index)) {
				Some(suggestion) => {
					suggestion.selected = !suggestion.selected;
					true
				}
				None => false,
			}
		};
		if changed {
			self.bus.emit(&WorkspaceEvent::SuggestionsChanged);
		}
	}

	/// Check or uncheck everything.
	pub fn set_all(&self, selected: bool) {
		let changed = {
			let mut session = self.session.borrow_mut();
			match session.as_mut() {
				Some(s) => {
					s.suggestions.iter_mut().for_each(|x| x.selected = selected);
					true
				}
				None => false,
			}
		};
		if changed {
			self.bus.emit(&WorkspaceEvent::SuggestionsChanged);
		}
	}

	/// Drop the session and orphan any outstanding request.
	pub fn clear(&self) {
		self.generation.set(self.generation.get() + 1);
		self.loading.set(false);
		if self.session.borrow_mut().take().is_some() {
			self.bus.emit(&WorkspaceEvent::SuggestionsChanged);
		}
	}

	/// Persist `selected` as cross-graph links. Returns how many were saved.
	pub async fn save(
		&self,
		source: &GraphId,
		target: &GraphId,
		context: &str,
		selected: Vec<ConnectionSuggestion>,
	) -> Result<usize> {
		let target = validate(source, Some(target), context).map_err(|e| report(&self.bus, e))?;
		let connections: Vec<ConnectionSuggestion> =
			selected.into_iter().filter(|s| s.selected).collect();
		if connections.is_empty() {
			return Err(report(
				&self.bus,
				GraphError::validation("Select at least one connection to save"),
			));
		}
		let count = connections.len();
		let request = SaveConnectionsRequest {
			target_graph_id: target,
			context: context.trim().to_string(),
			connections,
			method: SAVE_METHOD.to_string(),
		};
		self.api
			.save_connections(source, &request)
			.await
			.map_err(|e| report(&self.bus, e))?;

		info!("saved {count} cross-graph links from {source}");
		self.session.borrow_mut().take();
		self.bus.emit(&WorkspaceEvent::SuggestionsChanged);
		self.bus.emit(&WorkspaceEvent::ConnectionsSaved {
			graph_id: source.clone(),
			count,
		});
		Ok(count)
	}

	/// Save the checked candidates of the current session.
	pub async fn save_selected(&self) -> Result<usize> {
		let Some(session) = self.session() else {
			return Err(report(
				&self.bus,
				GraphError::validation("No suggestions to save"),
			));
		};
		let selected = session.selected();
		self.save(&session.source, &session.target, &session.context, selected)
			.await
	}
}
