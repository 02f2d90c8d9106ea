//! Backend seam. Every suspension point of the engine goes through [`GraphApi`].

mod http;

use async_trait::async_trait;
use serde::Serialize;

pub use http::HttpGraphApi;

use crate::error::Result;
use crate::model::{
	BuildRequest, ConnectionSuggestion, DocumentRef, Graph, GraphConfig, GraphId, RawGraphData,
};

/// Query of `GET /graphs/{id}/data`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataQuery {
	/// Include cross-graph links.
	pub include_connections: bool,
	/// Restrict cross-graph links to this graph.
	pub target_graph_id: Option<GraphId>,
}

/// Body of `POST /graphs/{id}/connections/suggest`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuggestRequest {
	/// Graph to connect to.
	pub target_graph_id: GraphId,
	/// Why the graphs should connect.
	pub context: String,
	/// Upper bound of suggestions.
	pub max_links: u32,
}

/// Body of `POST /graphs/{id}/connections`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SaveConnectionsRequest {
	/// Graph to connect to.
	pub target_graph_id: GraphId,
	/// Same context the suggestions were generated from.
	pub context: String,
	/// Checked suggestions only.
	pub connections: Vec<ConnectionSuggestion>,
	/// How the links were produced.
	pub method: String,
}

/// Operations the engine needs from the backend.
#[async_trait(?Send)]
pub trait GraphApi {
	/// `GET /graphs?user_id=`
	async fn list_graphs(&self) -> Result<Vec<Graph>>;

	/// `POST /graphs`
	async fn create_graph(&self, config: &GraphConfig) -> Result<Graph>;

	/// `PUT /graphs/{id}`
	async fn update_graph(&self, id: &GraphId, config: &GraphConfig) -> Result<Graph>;

	/// `DELETE /graphs/{id}`
	async fn delete_graph(&self, id: &GraphId) -> Result<()>;

	/// `POST /graphs/{id}/build`; accepted asynchronously.
	async fn trigger_build(&self, id: &GraphId, request: &BuildRequest) -> Result<()>;

	/// `GET /graphs/{id}/data`
	async fn graph_data(&self, id: &GraphId, query: &DataQuery) -> Result<RawGraphData>;

	/// `POST /graphs/{id}/connections/suggest`
	async fn suggest_connections(
		&self,
		id: &GraphId,
		request: &SuggestRequest,
	) -> Result<Vec<ConnectionSuggestion>>;

	/// `POST /graphs/{id}/connections`
	async fn save_connections(&self, id: &GraphId, request: &SaveConnectionsRequest)
	-> Result<()>;

	/// `GET /documents?user_id=`, aborted after the configured timeout.
	async fn list_documents(&self) -> Result<Vec<DocumentRef>>;
}
