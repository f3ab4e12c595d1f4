//! Visible-subgraph queries over a canonical graph.
//!
//! [`GraphQuery`] computes node degrees once, over the full edge set, so the
//! numbers shown next to a node do not move while the user filters. Every
//! [`GraphQuery::view`] call is a pure function of the graph and the
//! [`FilterState`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::trace;
use serde::{Deserialize, Serialize};

use super::model::{Edge, KnowledgeGraph, Node};

/// View-side predicates. Changing it never touches the graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterState {
	/// Empty means every type.
	pub selected_types: BTreeSet<String>,
	/// Empty means every relation.
	pub selected_relations: BTreeSet<String>,
	/// Case-insensitive substring of the node label.
	pub search_term: String,
	/// Nodes below this full-graph degree are hidden.
	pub min_degree: usize,
	/// `None` means unbounded.
	pub max_degree: Option<usize>,
	/// Show nodes with no edges at all.
	pub show_isolates: bool,
}

impl FilterState {
	/// Adds `node_type` to the selection, or removes it if already selected.
	pub fn toggle_type(&mut self, node_type: &str) {
		toggle(&mut self.selected_types, node_type);
	}

	/// Same as [`toggle_type`](Self::toggle_type) for relation labels.
	pub fn toggle_relation(&mut self, relation: &str) {
		toggle(&mut self.selected_relations, relation);
	}

	fn admits_degree(&self, degree: usize) -> bool {
		degree >= self.min_degree
			&& self.max_degree.is_none_or(|max| degree <= max)
			&& (degree > 0 || self.show_isolates)
	}
}

fn toggle(set: &mut BTreeSet<String>, value: &str) {
	if !set.remove(value) {
		set.insert(value.to_string());
	}
}

/// Citation indices to show on a node badge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationBadge {
	/// Smallest indices first, at most the display limit.
	pub shown: Vec<u32>,
	/// How many more indices did not fit.
	pub overflow: usize,
}

/// Result of applying a [`FilterState`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleGraph {
	/// Nodes passing every predicate, in graph order.
	pub visible_nodes: Vec<Node>,
	/// Edges with both endpoints visible and a selected relation.
	pub visible_edges: Vec<Edge>,
	/// Degree of every node in the full graph.
	pub degree_per_node: HashMap<String, usize>,
	/// Nodes of the full graph with degree zero.
	pub isolate_count: usize,
	/// Highest degree in the full graph.
	pub max_degree: usize,
	/// Sorted, distinct relation labels of the full graph.
	pub relation_type_list: Vec<String>,
}

/// A canonical graph plus the reference statistics derived from it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphQuery {
	graph: KnowledgeGraph,
	degree: HashMap<String, usize>,
	max_degree: usize,
	isolate_count: usize,
	relation_types: Vec<String>,
}

impl GraphQuery {
	/// Indexes `graph`. Degrees count every edge, whatever its relation.
	pub fn new(graph: KnowledgeGraph) -> Self {
		let mut degree: HashMap<String, usize> =
			graph.nodes.iter().map(|n| (n.id.clone(), 0)).collect();
		for edge in &graph.edges {
			*degree.entry(edge.source_node_id.clone()).or_default() += 1;
			*degree.entry(edge.target_node_id.clone()).or_default() += 1;
		}
		let max_degree = degree.values().copied().max().unwrap_or(0);
		let isolate_count = graph
			.nodes
			.iter()
			.filter(|n| degree.get(&n.id).copied().unwrap_or(0) == 0)
			.count();
		let relation_types = graph
			.edges
			.iter()
			.map(|e| e.relation_label.clone())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect();
		Self {
			graph,
			degree,
			max_degree,
			isolate_count,
			relation_types,
		}
	}

	/// The unfiltered graph.
	pub fn graph(&self) -> &KnowledgeGraph {
		&self.graph
	}

	/// Full-graph degree of `node_id`; zero for unknown ids.
	pub fn degree(&self, node_id: &str) -> usize {
		self.degree.get(node_id).copied().unwrap_or(0)
	}

	/// Highest degree of any node.
	pub fn max_degree(&self) -> usize {
		self.max_degree
	}

	/// Nodes with no edges.
	pub fn isolate_count(&self) -> usize {
		self.isolate_count
	}

	/// Sorted, distinct relation labels.
	pub fn relation_types(&self) -> &[String] {
		&self.relation_types
	}

	/// Number of nodes per type, over the full graph.
	pub fn type_counts(&self) -> BTreeMap<String, usize> {
		let mut counts = BTreeMap::new();
		for node in &self.graph.nodes {
			*counts.entry(node.node_type.clone()).or_default() += 1;
		}
		counts
	}

	/// A filter that shows everything except isolates, with the degree range
	/// spanning the whole graph.
	pub fn reset_filter(&self) -> FilterState {
		FilterState {
			max_degree: Some(self.max_degree),
			..FilterState::default()
		}
	}

	/// Type, search and degree predicates for one node.
	pub fn is_node_visible(&self, node: &Node, filter: &FilterState) -> bool {
		let type_ok =
			filter.selected_types.is_empty() || filter.selected_types.contains(&node.node_type);
		let term = filter.search_term.trim().to_lowercase();
		let search_ok = term.is_empty() || node.label.to_lowercase().contains(&term);
		type_ok && search_ok && filter.admits_degree(self.degree(&node.id))
	}

	/// Applies `filter`. Relation selection only hides edges, never nodes.
	pub fn view(&self, filter: &FilterState) -> VisibleGraph {
		let visible_nodes: Vec<Node> = self
			.graph
			.nodes
			.iter()
			.filter(|n| self.is_node_visible(n, filter))
			.cloned()
			.collect();
		let visible_ids: HashSet<&str> = visible_nodes.iter().map(|n| n.id.as_str()).collect();
		let visible_edges: Vec<Edge> = self
			.graph
			.edges
			.iter()
			.filter(|e| {
				visible_ids.contains(e.source_node_id.as_str())
					&& visible_ids.contains(e.target_node_id.as_str())
					&& (filter.selected_relations.is_empty()
						|| filter.selected_relations.contains(&e.relation_label))
			})
			.cloned()
			.collect();
		trace!(
			"filter kept {}/{} nodes, {}/{} edges",
			visible_nodes.len(),
			self.graph.nodes.len(),
			visible_edges.len(),
			self.graph.edges.len()
		);
		VisibleGraph {
			visible_nodes,
			visible_edges,
			degree_per_node: self.degree.clone(),
			isolate_count: self.isolate_count,
			max_degree: self.max_degree,
			relation_type_list: self.relation_types.clone(),
		}
	}

	/// Citation badge for one node, over every edge touching it in the full
	/// graph.
	pub fn citation_badge(&self, node_id: &str, limit: usize) -> CitationBadge {
		badge(
			self.graph
				.edges
				.iter()
				.filter(|e| e.touches(node_id))
				.flat_map(|e| e.citation_indices.iter().copied()),
			limit,
		)
	}
}

/// Badges for every node touched by `edges`.
pub fn citation_badges(edges: &[Edge], limit: usize) -> HashMap<String, CitationBadge> {
	let mut per_node: HashMap<&str, BTreeSet<u32>> = HashMap::new();
	for edge in edges {
		for id in [&edge.source_node_id, &edge.target_node_id] {
			per_node
				.entry(id.as_str())
				.or_default()
				.extend(edge.citation_indices.iter().copied());
		}
	}
	per_node
		.into_iter()
		.map(|(id, indices)| (id.to_string(), badge(indices, limit)))
		.collect()
}

fn badge(indices: impl IntoIterator<Item = u32>, limit: usize) -> CitationBadge {
	let all: BTreeSet<u32> = indices.into_iter().collect();
	CitationBadge {
		shown: all.iter().copied().take(limit).collect(),
		overflow: all.len().saturating_sub(limit),
	}
}
