use std::collections::HashMap;

use crate::engine::filter::{CitationBadge, VisibleGraph};
use crate::engine::layout::Layout;
use crate::engine::model::PositionedNode;

#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
	pub id: String,
	pub label: String,
	pub node_type: String,
	pub color: String,
	/// Position in layout space.
	pub x: f64,
	pub y: f64,
	pub degree: usize,
	/// e.g. `[1, 2, 4] +1`
	pub badge: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphLink {
	pub source: String,
	pub target: String,
	pub label: String,
}

/// Everything the canvas draws for one visible subgraph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphData {
	pub nodes: Vec<GraphNode>,
	pub links: Vec<GraphLink>,
	/// Side of the square layout canvas.
	pub canvas_size: f64,
	pub node_radius: f64,
}

impl GraphData {
	pub fn from_layout(
		positioned: Vec<PositionedNode>,
		view: &VisibleGraph,
		layout: &Layout,
		badges: &HashMap<String, CitationBadge>,
	) -> Self {
		let nodes = positioned
			.into_iter()
			.map(|p| GraphNode {
				degree: view.degree_per_node.get(&p.node.id).copied().unwrap_or(0),
				badge: badges.get(&p.node.id).and_then(badge_text),
				id: p.node.id,
				label: p.node.label,
				node_type: p.node.node_type,
				color: p.color,
				x: p.x,
				y: p.y,
			})
			.collect();
		let links = view
			.visible_edges
			.iter()
			.map(|e| GraphLink {
				source: e.source_node_id.clone(),
				target: e.target_node_id.clone(),
				label: e.relation_label.clone(),
			})
			.collect();
		Self {
			nodes,
			links,
			canvas_size: layout.canvas_size,
			node_radius: layout.node_size,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

fn badge_text(badge: &CitationBadge) -> Option<String> {
	if badge.shown.is_empty() {
		return None;
	}
	let shown: Vec<String> = badge.shown.iter().map(u32::to_string).collect();
	let mut text = format!("[{}]", shown.join(", "));
	if badge.overflow > 0 {
		text.push_str(&format!(" +{}", badge.overflow));
	}
	Some(text)
}
