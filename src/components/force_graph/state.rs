use std::collections::{HashMap, HashSet};

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};

use super::types::GraphData;

/// Minimum on-screen hit radius, in layout units at zoom 1.
pub const HIT_RADIUS: f64 = 8.0;
const FIT_MARGIN: f64 = 0.92;

#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
	pub label: String,
	pub node_type: String,
	pub color: String,
	pub badge: Option<String>,
	pub degree: usize,
}

impl NodeInfo {
	/// Text drawn under the node. Hovered nodes also show type and degree.
	pub fn caption(&self, hovered: bool) -> String {
		if hovered {
			format!("{} ({}, degree {})", self.label, self.node_type, self.degree)
		} else {
			self.label.clone()
		}
	}
}

#[derive(Clone, Debug)]
pub struct LinkInfo {
	pub source: DefaultNodeIdx,
	pub target: DefaultNodeIdx,
	pub label: String,
}

#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub node_idx: Option<DefaultNodeIdx>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f32,
	pub node_start_y: f32,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<DefaultNodeIdx>,
	pub neighbors: HashSet<DefaultNodeIdx>,
	pub highlight_t: f64,
	pub prev_node: Option<DefaultNodeIdx>,
	pub prev_neighbors: HashSet<DefaultNodeIdx>,
	delay_t: f64,
}

/// Canvas-side state for one visible subgraph.
///
/// Nodes enter the simulation pinned at their computed layout positions, so
/// the graph does not drift; dragging moves a node and keeps it pinned.
pub struct ForceGraphState {
	pub graph: ForceGraph<NodeInfo, ()>,
	pub links: Vec<LinkInfo>,
	pub node_radius: f64,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub width: f64,
	pub height: f64,
	pub flow_time: f64,
}

impl ForceGraphState {
	pub fn new(data: &GraphData, width: f64, height: f64) -> Self {
		let (graph, links) = build_graph(data);
		let mut state = Self {
			graph,
			links,
			node_radius: data.node_radius,
			transform: ViewTransform::default(),
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			width,
			height,
			flow_time: 0.0,
		};
		state.fit(data.canvas_size);
		state
	}

	/// Swaps in a new visible subgraph and refits the view. Hover and drag
	/// refer to the old node indices and are dropped.
	pub fn replace_data(&mut self, data: &GraphData) {
		let (graph, links) = build_graph(data);
		self.graph = graph;
		self.links = links;
		self.node_radius = data.node_radius;
		self.drag = DragState::default();
		self.pan = PanState::default();
		self.hover = HoverState::default();
		self.fit(data.canvas_size);
	}

	/// Centers the layout canvas on screen, scaled to fit.
	fn fit(&mut self, canvas_size: f64) {
		let k = if canvas_size > 0.0 {
			FIT_MARGIN * self.width.min(self.height) / canvas_size
		} else {
			1.0
		};
		self.transform = ViewTransform {
			x: self.width / 2.0,
			y: self.height / 2.0,
			k: k.clamp(0.1, 10.0),
		};
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<DefaultNodeIdx> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let hit = self.node_radius.max(HIT_RADIUS / self.transform.k);
		let mut found = None;
		self.graph.visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			if (dx * dx + dy * dy).sqrt() < hit {
				found = Some(node.index());
			}
		});
		found
	}

	/// Current position of every node.
	pub fn positions(&self) -> HashMap<DefaultNodeIdx, (f64, f64)> {
		let mut out = HashMap::new();
		self.graph.visit_nodes(|node| {
			out.insert(node.index(), (node.x() as f64, node.y() as f64));
		});
		out
	}

	pub fn begin_drag(&mut self, idx: DefaultNodeIdx, x: f64, y: f64) {
		let mut start = (0.0, 0.0);
		self.graph.visit_nodes(|node| {
			if node.index() == idx {
				start = (node.x(), node.y());
			}
		});
		self.drag = DragState {
			node_idx: Some(idx),
			start_x: x,
			start_y: y,
			node_start_x: start.0,
			node_start_y: start.1,
		};
	}

	pub fn drag_to(&mut self, x: f64, y: f64) {
		let Some(idx) = self.drag.node_idx else {
			return;
		};
		let (dx, dy) = (
			(x - self.drag.start_x) / self.transform.k,
			(y - self.drag.start_y) / self.transform.k,
		);
		let (nx, ny) = (self.drag.node_start_x + dx as f32, self.drag.node_start_y + dy as f32);
		self.graph.visit_nodes_mut(|node| {
			if node.index() == idx {
				node.data.x = nx;
				node.data.y = ny;
			}
		});
	}

	pub fn is_dragging(&self) -> bool {
		self.drag.node_idx.is_some()
	}

	pub fn release(&mut self) {
		self.drag = DragState::default();
		self.pan.active = false;
	}

	pub fn set_hover(&mut self, node: Option<DefaultNodeIdx>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// keep the old highlight for the fade-out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.node = node;
		self.hover.neighbors.clear();

		if let Some(idx) = node {
			if !was_hovering {
				self.hover.delay_t = 0.0;
			}
			for link in &self.links {
				if link.source == idx {
					self.hover.neighbors.insert(link.target);
				} else if link.target == idx {
					self.hover.neighbors.insert(link.source);
				}
			}
		}
	}

	pub fn is_highlighted(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx)
			|| self.hover.neighbors.contains(&idx)
			|| self.hover.prev_node == Some(idx)
			|| self.hover.prev_neighbors.contains(&idx)
	}

	pub fn is_hovered(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx) || self.hover.prev_node == Some(idx)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	pub fn tick(&mut self, dt: f32) {
		self.graph.update(dt);
		self.flow_time += dt as f64;

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt as f64).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

/// Loads the graph with every node anchored at its layout position, shifted so
/// the layout center sits at the origin.
fn build_graph(data: &GraphData) -> (ForceGraph<NodeInfo, ()>, Vec<LinkInfo>) {
	let mut graph = ForceGraph::new(SimulationParameters {
		force_charge: 150.0,
		force_spring: 0.05,
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	});
	let half = data.canvas_size / 2.0;
	let mut id_to_idx = HashMap::new();

	for node in &data.nodes {
		let idx = graph.add_node(NodeData {
			x: (node.x - half) as f32,
			y: (node.y - half) as f32,
			mass: 10.0,
			is_anchor: true,
			user_data: NodeInfo {
				label: node.label.clone(),
				node_type: node.node_type.clone(),
				color: node.color.clone(),
				badge: node.badge.clone(),
				degree: node.degree,
			},
		});
		id_to_idx.insert(node.id.as_str(), idx);
	}

	let mut links = Vec::with_capacity(data.links.len());
	for link in &data.links {
		if let (Some(&src), Some(&tgt)) = (
			id_to_idx.get(link.source.as_str()),
			id_to_idx.get(link.target.as_str()),
		) {
			graph.add_edge(src, tgt, EdgeData::default());
			links.push(LinkInfo {
				source: src,
				target: tgt,
				label: link.label.clone(),
			});
		}
	}
	(graph, links)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::types::{GraphLink, GraphNode};

	fn node(id: &str, x: f64, y: f64) -> GraphNode {
		GraphNode {
			id: id.into(),
			label: id.into(),
			node_type: "t".into(),
			color: "#1f77b4".into(),
			x,
			y,
			degree: 1,
			badge: None,
		}
	}

	fn data() -> GraphData {
		GraphData {
			nodes: vec![node("a", 100.0, 200.0), node("b", 300.0, 200.0), node("c", 200.0, 50.0)],
			links: vec![GraphLink {
				source: "a".into(),
				target: "b".into(),
				label: "KNOWS".into(),
			}],
			canvas_size: 400.0,
			node_radius: 10.0,
		}
	}

	#[test]
	fn fits_layout_into_viewport() {
		let state = ForceGraphState::new(&data(), 800.0, 400.0);
		assert_eq!(state.transform.x, 400.0);
		assert_eq!(state.transform.y, 200.0);
		assert!((state.transform.k - FIT_MARGIN).abs() < 1e-9);
	}

	#[test]
	fn hover_highlights_neighbors() {
		let mut state = ForceGraphState::new(&data(), 400.0, 400.0);
		// layout (100, 200) is graph (-100, 0)
		let (sx, sy) = (state.transform.x - 100.0 * state.transform.k, state.transform.y);
		let hit = state.node_at_position(sx, sy);
		assert!(hit.is_some());
		state.set_hover(hit);
		assert_eq!(state.hover.neighbors.len(), 1);
		assert_eq!(state.links[0].label, "KNOWS");
	}

	#[test]
	fn replace_data_resets_interaction() {
		let mut state = ForceGraphState::new(&data(), 400.0, 400.0);
		let first = state.positions().keys().next().copied();
		state.set_hover(first);
		state.replace_data(&GraphData::default());
		assert!(state.hover.node.is_none());
		assert!(state.positions().is_empty());
		assert!(state.links.is_empty());
	}

	#[test]
	fn hovered_caption_shows_type_and_degree() {
		let state = ForceGraphState::new(&data(), 400.0, 400.0);
		let mut found = None;
		state.graph.visit_nodes(|node| {
			if node.data.user_data.label == "a" {
				found = Some(node.data.user_data.clone());
			}
		});
		let info = found.unwrap();
		assert_eq!(info.caption(false), "a");
		assert_eq!(info.caption(true), "a (t, degree 1)");
	}
}
