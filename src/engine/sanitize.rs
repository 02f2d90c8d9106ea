//! Raw payload to render-safe graph.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::model::{GraphData, Link, Node, NodeStatus, RawGraphData, Relationship, canonical_id};

/// Smallest node size.
pub const BASE_VAL: f64 = 4.0;
/// Size added per link.
pub const VAL_PER_DEGREE: f64 = 1.5;
/// Cap on the degree contribution, so hubs do not dominate.
pub const MAX_DEGREE_VAL: f64 = 14.0;

/// Visual size of a node with `degree` links.
pub fn node_val(degree: usize) -> f64 {
	BASE_VAL + (degree as f64 * VAL_PER_DEGREE).min(MAX_DEGREE_VAL)
}

/// Sanitized data plus what was thrown away.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sanitized {
	/// Render-safe graph.
	pub data: GraphData,
	/// Nodes without a usable id, or duplicates.
	pub dropped_nodes: usize,
	/// Links with a dangling or unusable endpoint.
	pub dropped_links: usize,
}

/// Canonicalize ids, drop dangling links and size nodes by degree.
///
/// Never fails: anything inconsistent is dropped and counted.
pub fn sanitize(raw: RawGraphData) -> Sanitized {
	let mut dropped_nodes = 0;
	let mut seen = HashSet::new();
	let mut nodes = Vec::with_capacity(raw.nodes.len());
	for raw_node in raw.nodes {
		let Some(id) = canonical_id(&raw_node.id) else {
			dropped_nodes += 1;
			continue;
		};
		if !seen.insert(id.clone()) {
			dropped_nodes += 1;
			continue;
		}
		let name = raw_node
			.name
			.map(|n| n.trim().to_string())
			.filter(|n| !n.is_empty())
			.unwrap_or_else(|| id.clone());
		nodes.push(Node {
			id,
			name,
			description: raw_node.description.filter(|d| !d.trim().is_empty()),
			status: raw_node
				.status
				.as_deref()
				.map(NodeStatus::parse)
				.unwrap_or_default(),
			is_merged: raw_node.is_merged.unwrap_or(false),
			val: BASE_VAL,
		});
	}

	let total_links = raw.links.len();
	let links: Vec<Link> = raw
		.links
		.into_iter()
		.filter_map(|raw_link| {
			let source = canonical_id(&raw_link.source)?;
			let target = canonical_id(&raw_link.target)?;
			if !seen.contains(&source) || !seen.contains(&target) {
				return None;
			}
			Some(Link {
				source,
				target,
				relationship: raw_link
					.relationship
					.as_deref()
					.map(Relationship::parse)
					.unwrap_or_default(),
				confidence: raw_link.confidence.filter(|c| c.is_finite()),
			})
		})
		.collect();
	let dropped_links = total_links - links.len();

	let mut degree: HashMap<&str, usize> = HashMap::new();
	for link in &links {
		*degree.entry(link.source.as_str()).or_default() += 1;
		*degree.entry(link.target.as_str()).or_default() += 1;
	}
	for node in &mut nodes {
		node.val = node_val(degree.get(node.id.as_str()).copied().unwrap_or(0));
	}

	if dropped_links > 0 || dropped_nodes > 0 {
		debug!("sanitize: dropped {dropped_nodes} nodes and {dropped_links} links");
	}

	Sanitized {
		data: GraphData { nodes, links },
		dropped_nodes,
		dropped_links,
	}
}

/// Degree of every node in already-sanitized data.
pub fn degrees(data: &GraphData) -> HashMap<&str, usize> {
	let mut degree: HashMap<&str, usize> = data.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
	for link in &data.links {
		for end in [link.source.as_str(), link.target.as_str()] {
			if let Some(d) = degree.get_mut(end) {
				*d += 1;
			}
		}
	}
	degree
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn raw(value: serde_json::Value) -> RawGraphData {
		serde_json::from_value(value).unwrap()
	}

	#[test]
	fn dangling_links_are_dropped() {
		let out = sanitize(raw(json!({
			"nodes": [{"id": 1, "name": "Cell"}, {"id": "2", "name": "Nucleus"}],
			"links": [
				{"source": 1, "target": 2},
				{"source": "1", "target": 99},
				{"source": null, "target": 2},
				{"source": {"id": 2, "name": "Nucleus"}, "target": {"id": 1}}
			]
		})));
		assert_eq!(out.dropped_links, 2);
		assert_eq!(out.data.links.len(), 2);
		let ids: HashSet<&str> = out.data.nodes.iter().map(|n| n.id.as_str()).collect();
		for link in &out.data.links {
			assert!(ids.contains(link.source.as_str()));
			assert!(ids.contains(link.target.as_str()));
		}
	}

	#[test]
	fn val_grows_with_degree_and_is_capped() {
		let mut links = Vec::new();
		for i in 0..20 {
			links.push(json!({"source": "hub", "target": format!("leaf{i}")}));
		}
		links.push(json!({"source": "leaf0", "target": "leaf1"}));
		let mut nodes = vec![json!({"id": "hub"}), json!({"id": "loner"})];
		for i in 0..20 {
			nodes.push(json!({"id": format!("leaf{i}")}));
		}
		let out = sanitize(raw(json!({"nodes": nodes, "links": links})));
		let data = &out.data;
		let hub = data.node("hub").unwrap();
		let leaf0 = data.node("leaf0").unwrap();
		let leaf5 = data.node("leaf5").unwrap();
		let loner = data.node("loner").unwrap();

		assert_eq!(hub.val, 18.0);
		assert_eq!(leaf0.val, 4.0 + 3.0);
		assert_eq!(leaf5.val, 4.0 + 1.5);
		assert_eq!(loner.val, 4.0);

		let degree = degrees(data);
		for a in &data.nodes {
			assert!(a.val <= BASE_VAL + MAX_DEGREE_VAL);
			for b in &data.nodes {
				if degree[a.id.as_str()] > degree[b.id.as_str()] {
					assert!(a.val >= b.val, "{} vs {}", a.id, b.id);
				}
			}
		}
	}

	#[test]
	fn duplicate_and_idless_nodes() {
		let out = sanitize(raw(json!({
			"nodes": [
				{"id": 1, "name": "First"},
				{"id": "1", "name": "Second"},
				{"name": "no id"},
				{"id": 2, "name": "  ", "status": "completed", "is_merged": true}
			],
			"links": []
		})));
		assert_eq!(out.dropped_nodes, 2);
		assert_eq!(out.data.nodes.len(), 2);
		assert_eq!(out.data.node("1").unwrap().name, "First");
		let second = out.data.node("2").unwrap();
		assert_eq!(second.name, "2");
		assert_eq!(second.status, NodeStatus::Completed);
		assert!(second.is_merged);
	}

	#[test]
	fn self_loop_counts_twice() {
		let out = sanitize(raw(json!({
			"nodes": [{"id": "a"}],
			"links": [{"source": "a", "target": "a", "relationship": "cross_graph"}]
		})));
		assert_eq!(out.data.links.len(), 1);
		assert_eq!(out.data.links[0].relationship, Relationship::CrossGraph);
		assert_eq!(out.data.node("a").unwrap().val, node_val(2));
	}
}
