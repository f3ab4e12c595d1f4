//! Canonical graph shapes shared by the parser, layout and filter stages.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Builds the identity of an entity. Repeated mentions of the same
/// `(type, label)` pair always land on the same id.
pub fn node_id(node_type: &str, label: &str) -> String {
	format!("{node_type}:{label}")
}

/// A typed, labeled entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
	/// `type:label`, see [`node_id`].
	pub id: String,
	/// Entity type, e.g. `org`.
	#[serde(rename = "type")]
	pub node_type: String,
	/// Display label, unquoted.
	pub label: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	/// Lifted from a `url` attribute.
	pub url: Option<String>,
	/// Lifted from a `page` attribute.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub page: Option<String>,
	/// Secondary `key=value` pairs, first value per key.
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
	/// `[n]` indices cited next to the entity.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub citation_indices: Vec<u32>,
}

impl Node {
	/// Creates a node with no attributes; the id is derived from type and label.
	pub fn new(node_type: impl Into<String>, label: impl Into<String>) -> Self {
		let (node_type, label) = (node_type.into(), label.into());
		Self {
			id: node_id(&node_type, &label),
			node_type,
			label,
			url: None,
			page: None,
			attributes: BTreeMap::new(),
			citation_indices: Vec::new(),
		}
	}

	/// Builder: add an attribute.
	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}

	/// Folds a later mention of the same entity into this one.
	///
	/// Values already present win; anything only the other mention carries is
	/// kept.
	pub fn merge(&mut self, other: Node) {
		for (key, value) in other.attributes {
			self.attributes.entry(key).or_insert(value);
		}
		if self.url.is_none() {
			self.url = other.url;
		}
		if self.page.is_none() {
			self.page = other.page;
		}
		for index in other.citation_indices {
			if !self.citation_indices.contains(&index) {
				self.citation_indices.push(index);
			}
		}
	}
}

/// A directed, labeled relation between two nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
	/// `e{n}` within one parse.
	pub id: String,
	/// Tail of the arrow.
	pub source_node_id: String,
	/// Head of the arrow.
	pub target_node_id: String,
	/// Relation as written between the brackets, e.g. `OWNS`.
	pub relation_label: String,
	/// Resolved URLs of the cited sources, in citation order.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub citation_urls: Vec<String>,
	/// Raw `[n]` indices, resolved or not.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub citation_indices: Vec<u32>,
}

impl Edge {
	/// Whether `node_id` is either endpoint.
	pub fn touches(&self, node_id: &str) -> bool {
		self.source_node_id == node_id || self.target_node_id == node_id
	}
}

/// Deduplicated node set plus edges, built once per backend response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeGraph {
	/// One node per id, in first-mention order.
	pub nodes: Vec<Node>,
	/// Every edge references two ids in `nodes`.
	pub edges: Vec<Edge>,
	/// Sorted, distinct node types.
	pub types: Vec<String>,
}

impl KnowledgeGraph {
	/// Assembles a graph from already-canonical parts. Nodes sharing an id are
	/// merged into the first one; edges whose endpoints are not in `nodes` are
	/// dropped.
	pub fn from_parts(parts: Vec<Node>, edges: Vec<Edge>) -> Self {
		let total = parts.len();
		let mut nodes: Vec<Node> = Vec::with_capacity(total);
		let mut slot: HashMap<String, usize> = HashMap::new();
		for node in parts {
			match slot.get(&node.id) {
				Some(&i) => nodes[i].merge(node),
				None => {
					slot.insert(node.id.clone(), nodes.len());
					nodes.push(node);
				}
			}
		}
		if nodes.len() < total {
			log::debug!("merged {} duplicate nodes", total - nodes.len());
		}

		let known: BTreeSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
		let before = edges.len();
		let edges: Vec<Edge> = edges
			.into_iter()
			.filter(|e| {
				known.contains(e.source_node_id.as_str()) && known.contains(e.target_node_id.as_str())
			})
			.collect();
		if edges.len() < before {
			log::debug!("dropped {} dangling edges", before - edges.len());
		}
		let types = distinct_types(&nodes);
		Self { nodes, edges, types }
	}

	/// No nodes and no edges.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty() && self.edges.is_empty()
	}

	/// Looks a node up by id.
	pub fn node(&self, id: &str) -> Option<&Node> {
		self.nodes.iter().find(|n| n.id == id)
	}
}

pub(crate) fn distinct_types(nodes: &[Node]) -> Vec<String> {
	nodes
		.iter()
		.map(|n| n.node_type.clone())
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect()
}

/// Output of the fact text parser.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedGraphResult {
	/// Prose with the facts and sources blocks removed.
	pub clean_text: String,
	#[serde(flatten)]
	/// Extracted entities and relations.
	pub graph: KnowledgeGraph,
	/// Citation index to URL, from the `Sources:` block and any seeded table.
	pub source_index_to_url: BTreeMap<u32, String>,
	/// Diagnostic prose found before the answer marker.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub preamble: Option<String>,
	/// Non-empty fact items that did not match the grammar.
	#[serde(default)]
	pub skipped_items: usize,
}

/// A point in canvas space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
	/// Grows rightwards.
	pub x: f64,
	/// Grows downwards.
	pub y: f64,
}

impl Point {
	/// A point at `(x, y)`.
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	/// Euclidean distance.
	pub fn distance(self, other: Point) -> f64 {
		((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
	}
}

/// A node ready to be drawn.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
	#[serde(flatten)]
	/// The entity itself.
	pub node: Node,
	/// Horizontal canvas position.
	pub x: f64,
	/// Vertical canvas position.
	pub y: f64,
	/// CSS color of the node's type.
	pub color: String,
}

/// Index from node id to its position in a node slice.
pub(crate) fn index_by_id(nodes: &[Node]) -> HashMap<&str, usize> {
	nodes
		.iter()
		.enumerate()
		.map(|(i, n)| (n.id.as_str(), i))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn node_id_is_type_and_label() {
		let node = Node::new("risk", "fraud");
		assert_eq!(node.id, "risk:fraud");
	}

	#[test]
	fn merge_keeps_first_value_and_adds_missing() {
		let mut first = Node::new("org", "Acme").with_attribute("country", "UK");
		let second = Node::new("org", "Acme")
			.with_attribute("country", "US")
			.with_attribute("sector", "retail");
		first.merge(second);
		assert_eq!(first.attributes["country"], "UK");
		assert_eq!(first.attributes["sector"], "retail");
	}

	#[test]
	fn from_parts_drops_dangling_edges_and_sorts_types() {
		let nodes = vec![Node::new("risk", "fraud"), Node::new("control", "kyc")];
		let edges = vec![
			Edge {
				id: "e0".into(),
				source_node_id: "control:kyc".into(),
				target_node_id: "risk:fraud".into(),
				relation_label: "MITIGATES".into(),
				citation_urls: vec![],
				citation_indices: vec![],
			},
			Edge {
				id: "e1".into(),
				source_node_id: "control:kyc".into(),
				target_node_id: "risk:missing".into(),
				relation_label: "MITIGATES".into(),
				citation_urls: vec![],
				citation_indices: vec![],
			},
		];
		let graph = KnowledgeGraph::from_parts(nodes, edges);
		assert_eq!(graph.edges.len(), 1);
		assert_eq!(graph.types, vec!["control", "risk"]);
	}

	#[test]
	fn from_parts_merges_nodes_sharing_an_id() {
		let mut later = Node::new("org", "Acme").with_attribute("sector", "retail");
		later.citation_indices = vec![2];
		let nodes = vec![
			Node::new("org", "Acme").with_attribute("country", "UK"),
			Node::new("brand", "Widget"),
			later,
		];
		let graph = KnowledgeGraph::from_parts(nodes, vec![]);
		let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, vec!["org:Acme", "brand:Widget"]);
		let acme = graph.node("org:Acme").unwrap();
		assert_eq!(acme.attributes["country"], "UK");
		assert_eq!(acme.attributes["sector"], "retail");
		assert_eq!(acme.citation_indices, vec![2]);
	}

	#[test]
	fn parsed_result_serializes_flat_camel_case() {
		let result = ParsedGraphResult {
			clean_text: "hello".into(),
			..Default::default()
		};
		let json = serde_json::to_value(&result).unwrap();
		assert_eq!(json["cleanText"], "hello");
		assert!(json["nodes"].is_array());
		assert!(json["sourceIndexToUrl"].is_object());
	}
}
