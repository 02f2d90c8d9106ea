//! Client-side knowledge graph engine: catalog, builds, data, focus, suggestions.

mod build;
mod cache;
mod catalog;
pub mod sanitize;
mod selection;
mod suggestions;
mod workspace;

use log::{error, warn};

pub use build::{BuildSupervisor, PollOutcome, build_phase};
pub use cache::{FetchOutcome, GraphDataCache};
pub use catalog::GraphCatalog;
pub use selection::{
	CameraCommand, Focus, NeighborInfo, NodeDetails, SearchHit, SelectionFocusController,
	neighbors_of,
};
pub use suggestions::{ConnectionSuggestionEngine, SuggestionSession};
pub use workspace::Workspace;

use crate::error::{ErrorKind, GraphError};
use crate::events::{EventBus, WorkspaceEvent};

/// Log `err`, publish it as a notice and hand it back for `?`.
pub(crate) fn report(bus: &EventBus<WorkspaceEvent>, err: GraphError) -> GraphError {
	match err.kind() {
		ErrorKind::JobFailure => error!("{err}"),
		ErrorKind::Transient => warn!("{err}"),
		ErrorKind::Validation => log::debug!("rejected: {err}"),
	}
	bus.emit(&WorkspaceEvent::Notice(err.to_notice()));
	err
}
