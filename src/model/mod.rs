//! Wire and domain types shared by the engine and the map.

mod data;
mod graph;
pub mod ids;
mod suggestion;

pub use data::{
	GraphData, Link, Node, NodeId, NodeStatus, RawGraphData, RawLink, RawNode, Relationship,
};
pub use graph::{
	BuildMode, BuildRequest, DocumentRef, Graph, GraphConfig, GraphId, GraphStatus, SourceMode,
};
pub use ids::{DocumentId, canonical_id};
pub use suggestion::ConnectionSuggestion;
