//! Mirrors workspace state into Leptos signals.

use std::rc::Rc;
use std::sync::Arc;

use leptos::prelude::*;
use log::debug;

use crate::engine::{CameraCommand, Focus, NodeDetails, SuggestionSession, Workspace};
use crate::error::Notice;
use crate::events::WorkspaceEvent;
use crate::model::{Graph, GraphData, GraphId};

/// Reactive view of a [`Workspace`], cheap to copy into closures.
#[derive(Clone, Copy)]
pub struct UiState {
	pub workspace: StoredValue<Rc<Workspace>, LocalStorage>,
	pub graphs: RwSignal<Vec<Graph>>,
	pub selected: RwSignal<Option<GraphId>>,
	pub data: RwSignal<Arc<GraphData>>,
	pub focus: RwSignal<Focus>,
	pub details: RwSignal<Option<NodeDetails>>,
	pub camera: RwSignal<Option<CameraCommand>>,
	pub notice: RwSignal<Option<Notice>>,
	pub session: RwSignal<Option<SuggestionSession>>,
}

impl UiState {
	pub fn ws(&self) -> Rc<Workspace> {
		self.workspace.get_value()
	}

	/// Record of the selected graph.
	pub fn selected_graph(&self) -> Option<Graph> {
		let id = self.selected.get()?;
		self.graphs.with(|gs| gs.iter().find(|g| g.id == id).cloned())
	}

	/// Focus a node and move the camera to it.
	pub fn focus_node(&self, id: &str) {
		if let Some(command) = self.ws().focus_node(id) {
			self.camera.set(Some(command));
		}
	}

	fn apply(&self, ws: &Workspace, event: &WorkspaceEvent) {
		match event {
			WorkspaceEvent::CatalogChanged
			| WorkspaceEvent::GraphSelected(_)
			| WorkspaceEvent::GraphDeselected => {
				self.graphs.set(ws.catalog().graphs());
				self.selected.set(ws.catalog().selected());
			}
			WorkspaceEvent::DataLoaded { .. } | WorkspaceEvent::DataCleared => {
				self.data.set(ws.data());
				self.focus.set(ws.selection().focus());
				self.details.set(ws.node_details());
			}
			WorkspaceEvent::BuildUpdated { .. } => self.graphs.set(ws.catalog().graphs()),
			WorkspaceEvent::FocusChanged(_) => {
				self.focus.set(ws.selection().focus());
				self.details.set(ws.node_details());
			}
			WorkspaceEvent::SuggestionsChanged => self.session.set(ws.suggestions().session()),
			WorkspaceEvent::ConnectionsSaved { graph_id, count } => {
				debug!("{count} links saved from {graph_id}");
			}
			WorkspaceEvent::Notice(notice) => self.notice.set(Some(notice.clone())),
			WorkspaceEvent::NoticeCleared => self.notice.set(None),
		}
	}
}

/// Create the signals and keep them in sync with the bus.
pub fn bind(workspace: Rc<Workspace>) -> UiState {
	let ui = UiState {
		workspace: StoredValue::new_local(workspace.clone()),
		graphs: RwSignal::new(workspace.catalog().graphs()),
		selected: RwSignal::new(workspace.catalog().selected()),
		data: RwSignal::new(workspace.data()),
		focus: RwSignal::new(workspace.selection().focus()),
		details: RwSignal::new(None),
		camera: RwSignal::new(None),
		notice: RwSignal::new(None),
		session: RwSignal::new(None),
	};
	let weak = Rc::downgrade(&workspace);
	workspace
		.bus()
		.subscribe(move |event| {
			if let Some(ws) = weak.upgrade() {
				ui.apply(&ws, event);
			}
		})
		.detach();
	ui
}
