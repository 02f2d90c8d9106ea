//! Graph records, their configuration and build requests.

use serde::{Deserialize, Serialize};

use super::ids::{self, DocumentId};
use crate::error::{GraphError, Result};

/// Backend id of a graph.
pub type GraphId = String;

/// Lifecycle of a graph record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphStatus {
	/// Created, never built.
	#[default]
	Draft,
	/// A build job is running.
	Building,
	/// Last build succeeded.
	Ready,
	/// Last build failed.
	Error,
}

impl GraphStatus {
	/// Convert to string.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Draft => "draft",
			Self::Building => "building",
			Self::Ready => "ready",
			Self::Error => "error",
		}
	}

	/// Whether the build job has finished.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Ready | Self::Error)
	}

	/// Check if transition to another status is valid.
	pub fn can_transition_to(&self, to: &Self) -> bool {
		match (self, to) {
			(Self::Draft | Self::Ready | Self::Error, Self::Building) => true,
			(Self::Building, Self::Ready | Self::Error) => true,
			(a, b) if a == b => true,
			_ => false,
		}
	}
}

/// A graph record as returned by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
	/// Backend id.
	#[serde(deserialize_with = "ids::deserialize_id")]
	pub id: GraphId,
	/// Display name.
	#[serde(default)]
	pub name: String,
	/// Free text.
	#[serde(default)]
	pub description: String,
	/// Source documents.
	#[serde(default, deserialize_with = "ids::deserialize_id_list")]
	pub document_ids: Vec<DocumentId>,
	/// Lifecycle state.
	#[serde(default)]
	pub status: GraphStatus,
	/// 0 to 100 while building.
	#[serde(default)]
	pub build_progress: f64,
	/// Set when `status` is `error`.
	#[serde(default)]
	pub error_message: Option<String>,
	/// Extraction budget per document.
	#[serde(default)]
	pub extraction_max_chars: Option<u32>,
	/// Chunk size used by extraction.
	#[serde(default)]
	pub chunk_size: Option<u32>,
	/// Concepts in the last successful build.
	#[serde(default)]
	pub node_count: u32,
	/// Status of the ingestion job backing the build, when any.
	#[serde(default)]
	pub ingestion_job_status: Option<String>,
	/// Current step name of the build job.
	#[serde(default)]
	pub build_step: Option<String>,
}

impl Graph {
	/// Build progress clamped to 0..=100.
	pub fn progress(&self) -> f64 {
		if self.build_progress.is_finite() {
			self.build_progress.clamp(0.0, 100.0)
		} else {
			0.0
		}
	}

	/// The job reported a non-fatal pause, typically rate limiting.
	pub fn is_paused(&self) -> bool {
		let job_paused = self
			.ingestion_job_status
			.as_deref()
			.is_some_and(|s| s.eq_ignore_ascii_case("paused"));
		let rate_limited = self
			.build_step
			.as_deref()
			.is_some_and(|s| s.to_ascii_lowercase().contains("rate_limit"));
		self.status == GraphStatus::Building && (job_paused || rate_limited)
	}
}

/// Body of create and update requests.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GraphConfig {
	/// Required, non-empty.
	pub name: String,
	/// Free text.
	pub description: String,
	/// Source documents, in the shape the backend listed them.
	pub document_ids: Vec<DocumentId>,
	/// Extraction budget per document; `null` clears a stored override.
	pub extraction_max_chars: Option<u32>,
	/// Chunk size used by extraction; `null` clears a stored override.
	pub chunk_size: Option<u32>,
}

impl GraphConfig {
	/// Client-side checks; the server still has the final word.
	pub fn validate(&self) -> Result<()> {
		if self.name.trim().is_empty() {
			return Err(GraphError::validation("Graph name is required"));
		}
		validate_positive("extraction_max_chars", self.extraction_max_chars)?;
		validate_positive("chunk_size", self.chunk_size)?;
		Ok(())
	}

	/// Copy with the name trimmed.
	pub fn normalized(&self) -> Self {
		Self {
			name: self.name.trim().to_string(),
			..self.clone()
		}
	}

	/// Pre-filled from an existing record, for the edit form.
	pub fn from_graph(graph: &Graph) -> Self {
		Self {
			name: graph.name.clone(),
			description: graph.description.clone(),
			document_ids: graph.document_ids.clone(),
			extraction_max_chars: graph.extraction_max_chars,
			chunk_size: graph.chunk_size,
		}
	}
}

fn validate_positive(field: &str, value: Option<u32>) -> Result<()> {
	match value {
		Some(0) => Err(GraphError::validation(format!("{field} must be positive"))),
		_ => Ok(()),
	}
}

/// How a build treats existing nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
	/// Smart update: add newly linked documents, keep prior nodes and links.
	#[default]
	Existing,
	/// Discard and regenerate from scratch.
	Rebuild,
}

/// Which text the build extracts from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
	/// Cleaned text.
	#[default]
	Filtered,
	/// Raw extracted text.
	Raw,
}

/// Body of `POST /graphs/{id}/build`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BuildRequest {
	/// Smart update or full rebuild.
	pub build_mode: BuildMode,
	/// Filtered or raw source text.
	pub source_mode: SourceMode,
	/// Overrides the graph's extraction budget.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub extraction_max_chars: Option<u32>,
	/// Overrides the graph's chunk size.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub chunk_size: Option<u32>,
}

impl BuildRequest {
	/// Reject zero overrides.
	pub fn validate(&self) -> Result<()> {
		validate_positive("extraction_max_chars", self.extraction_max_chars)?;
		validate_positive("chunk_size", self.chunk_size)
	}
}

/// A source document that can be attached to a graph.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DocumentRef {
	/// Backend id.
	pub id: DocumentId,
	/// File or title.
	#[serde(default, alias = "filename", alias = "title")]
	pub name: String,
}

#[cfg(test)]
mod tests {
	use serde_json::{Value, json};

	use super::*;

	#[test]
	fn lifecycle_transitions() {
		use GraphStatus::*;
		assert!(Draft.can_transition_to(&Building));
		assert!(Ready.can_transition_to(&Building));
		assert!(Error.can_transition_to(&Building));
		assert!(Building.can_transition_to(&Ready));
		assert!(Building.can_transition_to(&Error));
		assert!(!Draft.can_transition_to(&Ready));
		assert!(!Ready.can_transition_to(&Draft));
		assert!(!Building.can_transition_to(&Draft));
	}

	#[test]
	fn graph_record_tolerates_loose_payload() {
		let graph: Graph = serde_json::from_value(json!({
			"id": 3,
			"name": "Biology Core",
			"document_ids": [7, "8", null],
			"status": "building",
			"build_progress": 140.0,
			"build_step": "extract_RATE_LIMIT_wait"
		}))
		.unwrap();
		assert_eq!(graph.id, "3");
		let keys: Vec<&str> = graph.document_ids.iter().map(DocumentId::key).collect();
		assert_eq!(keys, vec!["7", "8"]);
		assert_eq!(graph.progress(), 100.0);
		assert!(graph.is_paused());
		assert_eq!(graph.error_message, None);
	}

	#[test]
	fn paused_only_while_building() {
		let graph = Graph {
			id: "g".into(),
			status: GraphStatus::Ready,
			ingestion_job_status: Some("paused".into()),
			..Graph::default()
		};
		assert!(!graph.is_paused());
	}

	#[test]
	fn config_validation() {
		let mut config = GraphConfig {
			name: "   ".into(),
			..GraphConfig::default()
		};
		assert!(matches!(config.validate(), Err(GraphError::Validation(_))));
		config.name = "Biology Core".into();
		assert!(config.validate().is_ok());
		config.chunk_size = Some(0);
		assert!(config.validate().is_err());
	}

	#[test]
	fn config_body_keeps_id_shape_and_sends_null_limits() {
		let graph: Graph = serde_json::from_value(json!({
			"id": "g1",
			"name": "Biology Core",
			"document_ids": [7, "doc-8"],
			"chunk_size": 800
		}))
		.unwrap();
		let mut config = GraphConfig::from_graph(&graph);
		config.chunk_size = None;
		let body = serde_json::to_value(&config).unwrap();
		assert_eq!(body["document_ids"], json!([7, "doc-8"]));
		assert_eq!(body["chunk_size"], Value::Null);
		assert_eq!(body["extraction_max_chars"], Value::Null);
		assert!(body.as_object().unwrap().contains_key("chunk_size"));
	}

	#[test]
	fn terminal_statuses() {
		assert!(GraphStatus::Ready.is_terminal());
		assert!(GraphStatus::Error.is_terminal());
		assert!(!GraphStatus::Building.is_terminal());
		assert!(!GraphStatus::Draft.is_terminal());
	}

	#[test]
	fn build_request_body() {
		let body = serde_json::to_value(BuildRequest::default()).unwrap();
		assert_eq!(body, json!({"build_mode": "existing", "source_mode": "filtered"}));
	}
}
