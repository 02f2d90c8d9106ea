//! Node and link payloads, raw and sanitized.

use std::collections::HashMap;

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Canonical node id.
pub type NodeId = String;

/// Learning status of a concept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
	/// Not yet reachable.
	#[default]
	Locked,
	/// Reachable, not started.
	Unlocked,
	/// Being worked on.
	InProgress,
	/// Done.
	Completed,
}

impl NodeStatus {
	/// Lenient parse; unknown values are `Locked`.
	pub fn parse(s: &str) -> Self {
		match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
			"UNLOCKED" => Self::Unlocked,
			"IN_PROGRESS" => Self::InProgress,
			"COMPLETED" => Self::Completed,
			_ => Self::Locked,
		}
	}

	/// Display label.
	pub fn label(&self) -> &'static str {
		match self {
			Self::Locked => "Locked",
			Self::Unlocked => "Unlocked",
			Self::InProgress => "In progress",
			Self::Completed => "Completed",
		}
	}
}

/// Kind of edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
	/// Both endpoints in the same graph.
	#[default]
	IntraGraph,
	/// User-approved link between two graphs.
	CrossGraph,
}

impl Relationship {
	/// Anything other than `cross_graph` is intra-graph.
	pub fn parse(s: &str) -> Self {
		if s.trim().eq_ignore_ascii_case("cross_graph") {
			Self::CrossGraph
		} else {
			Self::IntraGraph
		}
	}
}

/// A sanitized concept.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
	/// Canonical id, unique within the loaded graph.
	pub id: NodeId,
	/// Display name.
	pub name: String,
	/// Optional summary.
	pub description: Option<String>,
	/// Learning status.
	pub status: NodeStatus,
	/// Result of cross-graph concept merging.
	pub is_merged: bool,
	/// Visual size derived from degree.
	pub val: f64,
}

impl Node {
	/// Rendered with a label regardless of zoom.
	pub fn is_important(&self) -> bool {
		self.is_merged || self.status != NodeStatus::Locked
	}
}

/// A sanitized link; both endpoints exist in the node set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Link {
	/// Canonical source id.
	pub source: NodeId,
	/// Canonical target id.
	pub target: NodeId,
	/// Intra- or cross-graph.
	pub relationship: Relationship,
	/// Extraction confidence, when known.
	pub confidence: Option<f64>,
}

impl Link {
	/// The link has `id` as one of its endpoints.
	pub fn touches(&self, id: &str) -> bool {
		self.source == id || self.target == id
	}
}

/// A sanitized graph, ready to render.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GraphData {
	/// Concepts.
	pub nodes: Vec<Node>,
	/// Relationships.
	pub links: Vec<Link>,
}

impl GraphData {
	/// No nodes loaded.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Look up a node by canonical id.
	pub fn node(&self, id: &str) -> Option<&Node> {
		self.nodes.iter().find(|n| n.id == id)
	}

	/// Id to index lookup table.
	pub fn index(&self) -> HashMap<&str, usize> {
		self.nodes
			.iter()
			.enumerate()
			.map(|(i, n)| (n.id.as_str(), i))
			.collect()
	}
}

/// Node as sent by the backend, before sanitization.
///
/// Every field is read leniently: a value of the wrong JSON type becomes
/// `None` instead of failing the whole payload.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawNode {
	/// Any id shape.
	#[serde(default)]
	pub id: Value,
	/// Display name.
	#[serde(default, alias = "label", alias = "title", deserialize_with = "lenient_text")]
	pub name: Option<String>,
	/// Optional summary.
	#[serde(default, deserialize_with = "lenient_text")]
	pub description: Option<String>,
	/// Free-form status string.
	#[serde(default, deserialize_with = "lenient_text")]
	pub status: Option<String>,
	/// Merge flag; missing means false.
	#[serde(default, deserialize_with = "lenient_bool")]
	pub is_merged: Option<bool>,
}

/// Link as sent by the backend, before sanitization.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawLink {
	/// Id, record reference or whole node object.
	#[serde(default)]
	pub source: Value,
	/// Id, record reference or whole node object.
	#[serde(default)]
	pub target: Value,
	/// `intra_graph` or `cross_graph`.
	#[serde(default, alias = "type", deserialize_with = "lenient_text")]
	pub relationship: Option<String>,
	/// Extraction confidence.
	#[serde(default, deserialize_with = "lenient_f64")]
	pub confidence: Option<f64>,
}

/// Body of `GET /graphs/{id}/data`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawGraphData {
	/// Possibly inconsistent nodes.
	#[serde(default, deserialize_with = "lenient_list")]
	pub nodes: Vec<RawNode>,
	/// Possibly dangling links.
	#[serde(default, deserialize_with = "lenient_list")]
	pub links: Vec<RawLink>,
}

/// Strings as is, numbers and booleans printed, anything else `None`.
fn lenient_text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
	Ok(match Value::deserialize(de)? {
		Value::String(s) => Some(s),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		Value::Null | Value::Array(_) | Value::Object(_) => None,
	})
}

/// Booleans, `"true"`/`"false"` strings and 0/1 numbers.
fn lenient_bool<'de, D: Deserializer<'de>>(de: D) -> Result<Option<bool>, D::Error> {
	Ok(match Value::deserialize(de)? {
		Value::Bool(b) => Some(b),
		Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
			"true" | "1" | "yes" => Some(true),
			"false" | "0" | "no" => Some(false),
			_ => None,
		},
		Value::Number(n) => n.as_f64().map(|f| f != 0.0),
		Value::Null | Value::Array(_) | Value::Object(_) => None,
	})
}

/// Finite numbers, or strings that parse as one.
fn lenient_f64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
	let parsed = match Value::deserialize(de)? {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse::<f64>().ok(),
		_ => None,
	};
	Ok(parsed.filter(|f| f.is_finite()))
}

/// Array entries that decode; a missing, null or non-array value is empty.
fn lenient_list<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
	D: Deserializer<'de>,
	T: DeserializeOwned,
{
	let Value::Array(items) = Value::deserialize(de)? else {
		return Ok(Vec::new());
	};
	let total = items.len();
	let kept: Vec<T> = items
		.into_iter()
		.filter_map(|item| serde_json::from_value(item).ok())
		.collect();
	if kept.len() < total {
		debug!("skipped {} undecodable entries", total - kept.len());
	}
	Ok(kept)
}
