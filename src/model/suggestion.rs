use serde::{Deserialize, Serialize};

use super::data::{Link, Relationship};
use super::ids;

/// A candidate cross-graph link proposed by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSuggestion {
	/// Concept in the source graph.
	#[serde(deserialize_with = "ids::deserialize_id")]
	pub from_scoped_id: String,
	/// Concept in the target graph.
	#[serde(deserialize_with = "ids::deserialize_id")]
	pub to_scoped_id: String,
	/// 0 to 1.
	#[serde(default)]
	pub confidence: f64,
	/// Why the backend thinks these connect.
	#[serde(default)]
	pub rationale: String,
	/// Checked in the curation list; every suggestion arrives checked.
	#[serde(skip_serializing, default = "checked")]
	pub selected: bool,
}

fn checked() -> bool {
	true
}

impl ConnectionSuggestion {
	/// The link this suggestion becomes once saved.
	pub fn to_link(&self) -> Link {
		Link {
			source: self.from_scoped_id.clone(),
			target: self.to_scoped_id.clone(),
			relationship: Relationship::CrossGraph,
			confidence: Some(self.confidence),
		}
	}
}
