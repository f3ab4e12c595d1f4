//! Force-directed layout.
//!
//! Positions an arbitrary node/edge set inside a circular area on a square
//! canvas. Runs a fixed number of iterations; each one applies
//! - inverse-distance repulsion between every pair of nodes
//! - a spring with a rest length along every edge
//! - a pull toward the canvas center that grows with distance
//! - velocity damping, then a step scaled by a linearly cooling temperature
//! - a soft boundary past an inner radius and a hard clamp at the rim
//!
//! Canvas size and node footprint are derived from the node count, so dense
//! graphs get more room and smaller nodes without manual tuning.
//!
//! # Usage
//! ```ignore
//! let mut rng = StdRng::seed_from_u64(7);
//! let layout = layout(&graph.nodes, &graph.edges, &LayoutConfig::default(), &mut rng);
//! for node in &graph.nodes {
//!     let p = layout.position(&node.id).unwrap();
//!     draw_circle(p.x, p.y, layout.node_size);
//! }
//! ```

use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::color::TypeColors;
use super::model::{Edge, Node, Point, PositionedNode, distinct_types, index_by_id};

/// Golden angle, used to pick a deterministic direction for coincident nodes.
const GOLDEN_ANGLE: f64 = 2.399_963;

// =============================================================================
// CONFIG
// =============================================================================

/// Simulation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
	/// Fixed iteration budget.
	pub iterations: usize,
	/// Canvas side length for an empty graph.
	pub base_canvas: f64,
	/// Canvas growth per square root of the node count.
	pub canvas_per_node: f64,
	/// Node footprint (radius) for tiny graphs.
	pub max_node_size: f64,
	/// Node footprint never shrinks below this.
	pub min_node_size: f64,
	/// Spring rest length as a multiple of the node footprint.
	pub rest_length_factor: f64,
	/// Repulsion at one rest length of distance.
	pub repulsion: f64,
	/// Spring stiffness along edges.
	pub spring: f64,
	/// Multiplier on the center pull. 1.0 balances repulsion so the graph
	/// fills roughly `fill` of the usable radius.
	pub gravity: f64,
	/// Fraction of the usable radius the center pull aims for.
	pub fill: f64,
	/// Velocity multiplier per step, in (0, 1).
	pub damping: f64,
	/// Temperature floor; temperature decays linearly from 1.0 to this.
	pub min_temperature: f64,
	/// Soft boundary kicks in past this fraction of the usable radius.
	pub boundary_threshold: f64,
	/// How hard the soft boundary pushes back.
	pub boundary_stiffness: f64,
	/// Initial scatter around a type anchor, in node footprints.
	pub jitter: f64,
	/// Radius of the circle carrying the type anchors, as a fraction of the
	/// usable radius.
	pub anchor_radius: f64,
	/// Seed for the initial scatter. `None` draws from entropy.
	pub seed: Option<u64>,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			iterations: 150,
			base_canvas: 600.0,
			canvas_per_node: 40.0,
			max_node_size: 28.0,
			min_node_size: 8.0,
			rest_length_factor: 4.0,
			repulsion: 2.0,
			spring: 0.1,
			gravity: 1.0,
			fill: 0.7,
			damping: 0.85,
			min_temperature: 0.05,
			boundary_threshold: 0.85,
			boundary_stiffness: 0.2,
			jitter: 3.0,
			anchor_radius: 0.45,
			seed: Some(0x5eed),
		}
	}
}

impl LayoutConfig {
	/// Canvas side length for `n` nodes.
	pub fn canvas_size(&self, n: usize) -> f64 {
		self.base_canvas + self.canvas_per_node * (n as f64).sqrt()
	}

	/// Node footprint (radius) for `n` nodes.
	pub fn node_size(&self, n: usize) -> f64 {
		(self.max_node_size / (1.0 + n as f64 / 60.0).sqrt()).max(self.min_node_size)
	}
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Node positions on a square canvas of side `canvas_size`. Every position
/// lies inside the circle inscribed in the canvas.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
	/// Side of the square canvas.
	pub canvas_size: f64,
	/// Suggested node radius for this graph size.
	pub node_size: f64,
	/// Spring length the simulation settled towards.
	pub rest_length: f64,
	/// Position per node id.
	pub positions: HashMap<String, Point>,
}

impl Layout {
	/// Middle of the canvas.
	pub fn center(&self) -> Point {
		Point::new(self.canvas_size / 2.0, self.canvas_size / 2.0)
	}

	/// Radius of the bounding circle.
	pub fn radius(&self) -> f64 {
		self.canvas_size / 2.0
	}

	/// Where node `id` ended up, if it was laid out.
	pub fn position(&self, id: &str) -> Option<Point> {
		self.positions.get(id).copied()
	}
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Lays out `nodes`, drawing the initial scatter from `rng`. Edges whose
/// endpoints are not in `nodes` are ignored.
pub fn layout<R: Rng + ?Sized>(
	nodes: &[Node],
	edges: &[Edge],
	config: &LayoutConfig,
	rng: &mut R,
) -> Layout {
	let n = nodes.len();
	let canvas_size = config.canvas_size(n);
	let node_size = config.node_size(n);
	let rest_length = node_size * config.rest_length_factor;
	let center = Point::new(canvas_size / 2.0, canvas_size / 2.0);
	let usable = canvas_size / 2.0 - node_size;

	let mut positions = seed_positions(nodes, center, usable, node_size, config, rng);
	let mut velocities = vec![(0.0, 0.0); n];

	let index = index_by_id(nodes);
	let springs: Vec<(usize, usize)> = edges
		.iter()
		.filter_map(|e| {
			let (s, t) = (
				*index.get(e.source_node_id.as_str())?,
				*index.get(e.target_node_id.as_str())?,
			);
			(s != t).then_some((s, t))
		})
		.collect();

	let repulsion = config.repulsion * rest_length;
	let target_radius = (config.fill * usable).max(1.0);
	let gravity = config.gravity * repulsion * n as f64 / (target_radius * target_radius);
	let min_distance = node_size * 0.25;
	let inner = config.boundary_threshold * usable;
	let iterations = config.iterations.max(1);

	for iteration in 0..iterations {
		let temperature = (1.0 - iteration as f64 / iterations as f64).max(config.min_temperature);
		let mut forces = vec![(0.0, 0.0); n];

		for i in 0..n {
			for j in (i + 1)..n {
				let (dx, dy) = (positions[i].x - positions[j].x, positions[i].y - positions[j].y);
				let len = (dx * dx + dy * dy).sqrt();
				let (ux, uy) = if len > 1e-9 {
					(dx / len, dy / len)
				} else {
					let angle = (i + j) as f64 * GOLDEN_ANGLE;
					(angle.cos(), angle.sin())
				};
				let f = repulsion / len.max(min_distance);
				forces[i].0 += ux * f;
				forces[i].1 += uy * f;
				forces[j].0 -= ux * f;
				forces[j].1 -= uy * f;
			}
		}

		for &(s, t) in &springs {
			let (dx, dy) = (positions[t].x - positions[s].x, positions[t].y - positions[s].y);
			let len = (dx * dx + dy * dy).sqrt();
			if len < 1e-9 {
				continue;
			}
			let f = config.spring * (len - rest_length);
			let (fx, fy) = (dx / len * f, dy / len * f);
			forces[s].0 += fx;
			forces[s].1 += fy;
			forces[t].0 -= fx;
			forces[t].1 -= fy;
		}

		for i in 0..n {
			let p = &mut positions[i];
			let v = &mut velocities[i];
			let (mut fx, mut fy) = forces[i];
			fx += (center.x - p.x) * gravity;
			fy += (center.y - p.y) * gravity;

			v.0 = (v.0 + fx) * config.damping;
			v.1 = (v.1 + fy) * config.damping;

			let (mut sx, mut sy) = (v.0 * temperature, v.1 * temperature);
			let step = (sx * sx + sy * sy).sqrt();
			if step > rest_length {
				sx *= rest_length / step;
				sy *= rest_length / step;
			}
			p.x += sx;
			p.y += sy;

			let (rx, ry) = (p.x - center.x, p.y - center.y);
			let r = (rx * rx + ry * ry).sqrt();
			if r > inner && r > 1e-9 {
				let (ux, uy) = (rx / r, ry / r);
				let push = (r - inner) * config.boundary_stiffness;
				v.0 -= ux * push;
				v.1 -= uy * push;
				if r > usable {
					p.x = center.x + ux * usable;
					p.y = center.y + uy * usable;
					let outward = v.0 * ux + v.1 * uy;
					if outward > 0.0 {
						v.0 -= ux * outward;
						v.1 -= uy * outward;
					}
				}
			}
		}
	}

	debug!(
		"layout: {} nodes, {} springs, canvas {:.0}px, node size {:.1}",
		n,
		springs.len(),
		canvas_size,
		node_size
	);

	Layout {
		canvas_size,
		node_size,
		rest_length,
		positions: nodes
			.iter()
			.zip(positions)
			.map(|(node, p)| (node.id.clone(), p))
			.collect(),
	}
}

/// Lays out with a generator seeded from `seed`. Same inputs and seed give
/// bit-identical positions.
pub fn layout_seeded(nodes: &[Node], edges: &[Edge], config: &LayoutConfig, seed: u64) -> Layout {
	layout(nodes, edges, config, &mut StdRng::seed_from_u64(seed))
}

/// Lays out using the configured seed, or fresh entropy when there is none.
pub fn layout_with_config(nodes: &[Node], edges: &[Edge], config: &LayoutConfig) -> Layout {
	match config.seed {
		Some(seed) => layout_seeded(nodes, edges, config, seed),
		None => layout(nodes, edges, config, &mut StdRng::from_entropy()),
	}
}

/// Scatters nodes around one anchor per type. Anchors sit evenly on a circle
/// so same-typed entities start clustered.
fn seed_positions<R: Rng + ?Sized>(
	nodes: &[Node],
	center: Point,
	usable: f64,
	node_size: f64,
	config: &LayoutConfig,
	rng: &mut R,
) -> Vec<Point> {
	let types = distinct_types(nodes);
	let ring = config.anchor_radius * usable;
	let anchors: HashMap<&str, Point> = types
		.iter()
		.enumerate()
		.map(|(k, t)| {
			let anchor = if types.len() == 1 {
				center
			} else {
				let angle = TAU * k as f64 / types.len() as f64 - PI / 2.0;
				Point::new(center.x + ring * angle.cos(), center.y + ring * angle.sin())
			};
			(t.as_str(), anchor)
		})
		.collect();

	let spread = config.jitter * node_size;
	nodes
		.iter()
		.map(|node| {
			let anchor = anchors.get(node.node_type.as_str()).copied().unwrap_or(center);
			Point::new(
				anchor.x + rng.gen_range(-1.0..=1.0) * spread,
				anchor.y + rng.gen_range(-1.0..=1.0) * spread,
			)
		})
		.collect()
}

/// Joins nodes with their layout positions and type colors. Nodes the layout
/// does not know are left out.
pub fn position_nodes(nodes: &[Node], layout: &Layout, colors: &mut TypeColors) -> Vec<PositionedNode> {
	nodes
		.iter()
		.filter_map(|node| {
			let p = layout.position(&node.id)?;
			Some(PositionedNode {
				node: node.clone(),
				x: p.x,
				y: p.y,
				color: colors.get(&node.node_type).to_string(),
			})
		})
		.collect()
}

// =============================================================================
// CACHE
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
struct LayoutKey {
	nodes: Vec<String>,
	edges: Vec<(String, String, String)>,
	config: LayoutConfig,
}

impl LayoutKey {
	fn new(nodes: &[Node], edges: &[Edge], config: &LayoutConfig) -> Self {
		let mut node_ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
		node_ids.sort();
		let mut edge_keys: Vec<(String, String, String)> = edges
			.iter()
			.map(|e| (e.id.clone(), e.source_node_id.clone(), e.target_node_id.clone()))
			.collect();
		edge_keys.sort();
		Self {
			nodes: node_ids,
			edges: edge_keys,
			config: config.clone(),
		}
	}
}

/// Remembers the most recent layout so an unchanged visible subgraph is not
/// simulated again.
#[derive(Clone, Debug, Default)]
pub struct LayoutCache {
	last: Option<(LayoutKey, Layout)>,
	computations: usize,
}

impl LayoutCache {
	/// An empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the cached layout when the node set, edge set and config match
	/// the previous call; otherwise runs [`layout_with_config`].
	pub fn get_or_compute(&mut self, nodes: &[Node], edges: &[Edge], config: &LayoutConfig) -> &Layout {
		let key = LayoutKey::new(nodes, edges, config);
		if self.last.as_ref().is_some_and(|(k, _)| *k != key) {
			self.last = None;
		}
		let computations = &mut self.computations;
		let (_, layout) = self.last.get_or_insert_with(|| {
			*computations += 1;
			(key, layout_with_config(nodes, edges, config))
		});
		layout
	}

	/// How many times the simulation actually ran.
	pub fn computations(&self) -> usize {
		self.computations
	}

	/// Forgets the cached layout; the next call recomputes.
	pub fn clear(&mut self) {
		self.last = None;
	}
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
	use super::*;

	fn edge(id: usize, s: &str, t: &str) -> Edge {
		Edge {
			id: format!("e{id}"),
			source_node_id: s.into(),
			target_node_id: t.into(),
			relation_label: "R".into(),
			citation_urls: vec![],
			citation_indices: vec![],
		}
	}

	fn ring(n: usize) -> (Vec<Node>, Vec<Edge>) {
		let nodes: Vec<Node> = (0..n).map(|i| Node::new("t", format!("n{i}"))).collect();
		let edges = (0..n)
			.map(|i| edge(i, &nodes[i].id, &nodes[(i + 1) % n].id))
			.collect();
		(nodes, edges)
	}

	fn star(n: usize) -> (Vec<Node>, Vec<Edge>) {
		let mut nodes = vec![Node::new("hub", "center")];
		nodes.extend((0..n).map(|i| Node::new(format!("type{}", i % 4), format!("leaf{i}"))));
		let edges = (1..=n).map(|i| edge(i, "hub:center", &nodes[i].id)).collect();
		(nodes, edges)
	}

	fn assert_inside(layout: &Layout) {
		let (c, r) = (layout.center(), layout.radius());
		for (id, p) in &layout.positions {
			assert!(p.x.is_finite() && p.y.is_finite(), "{id} not finite");
			assert!(p.distance(c) <= r + 1e-9, "{id} escaped the boundary");
			assert!((0.0..=layout.canvas_size).contains(&p.x));
			assert!((0.0..=layout.canvas_size).contains(&p.y));
		}
	}

	#[test]
	fn empty_graph() {
		let layout = layout_seeded(&[], &[], &LayoutConfig::default(), 1);
		assert!(layout.positions.is_empty());
		assert_eq!(layout.canvas_size, LayoutConfig::default().base_canvas);
	}

	#[test]
	fn single_node_sits_inside() {
		let nodes = vec![Node::new("t", "only")];
		let layout = layout_seeded(&nodes, &[], &LayoutConfig::default(), 1);
		assert_eq!(layout.positions.len(), 1);
		assert_inside(&layout);
	}

	#[test]
	fn positions_stay_inside_the_circle() {
		for (nodes, edges) in [ring(12), star(80), ring(300)] {
			let layout = layout_seeded(&nodes, &edges, &LayoutConfig::default(), 42);
			assert_eq!(layout.positions.len(), nodes.len());
			assert_inside(&layout);
		}
	}

	#[test]
	fn disconnected_nodes_stay_inside() {
		let nodes: Vec<Node> = (0..150).map(|i| Node::new(format!("t{}", i % 7), format!("n{i}"))).collect();
		let layout = layout_seeded(&nodes, &[], &LayoutConfig::default(), 3);
		assert_inside(&layout);
	}

	#[test]
	fn same_seed_is_bit_identical() {
		let (nodes, edges) = star(40);
		let config = LayoutConfig::default();
		let a = layout_seeded(&nodes, &edges, &config, 99);
		let b = layout_seeded(&nodes, &edges, &config, 99);
		for node in &nodes {
			let (pa, pb) = (a.positions[&node.id], b.positions[&node.id]);
			assert_eq!(pa.x.to_bits(), pb.x.to_bits());
			assert_eq!(pa.y.to_bits(), pb.y.to_bits());
		}
	}

	#[test]
	fn edge_lengths_cluster_near_rest_length() {
		let (nodes, edges) = ring(12);
		let config = LayoutConfig {
			seed: None,
			..LayoutConfig::default()
		};
		for _ in 0..3 {
			let layout = layout_with_config(&nodes, &edges, &config);
			let mean = edges
				.iter()
				.map(|e| layout.positions[&e.source_node_id].distance(layout.positions[&e.target_node_id]))
				.sum::<f64>()
				/ edges.len() as f64;
			assert!(
				mean > 0.5 * layout.rest_length && mean < 2.0 * layout.rest_length,
				"mean edge length {mean} vs rest {}",
				layout.rest_length
			);
		}
	}

	#[test]
	fn nodes_do_not_collapse() {
		let (nodes, edges) = star(20);
		let layout = layout_seeded(&nodes, &edges, &LayoutConfig::default(), 5);
		let ids: Vec<&String> = layout.positions.keys().collect();
		for i in 0..ids.len() {
			for j in (i + 1)..ids.len() {
				let d = layout.positions[ids[i]].distance(layout.positions[ids[j]]);
				assert!(d > layout.node_size * 0.25, "{} and {} overlap", ids[i], ids[j]);
			}
		}
	}

	#[test]
	fn bigger_graphs_get_bigger_canvas_and_smaller_nodes() {
		let config = LayoutConfig::default();
		assert!(config.canvas_size(200) > config.canvas_size(10));
		assert!(config.node_size(200) < config.node_size(10));
		assert_eq!(config.node_size(100_000), config.min_node_size);
	}

	#[test]
	fn dangling_and_self_edges_are_ignored() {
		let nodes = vec![Node::new("t", "a"), Node::new("t", "b")];
		let edges = vec![edge(0, "t:a", "t:missing"), edge(1, "t:a", "t:a"), edge(2, "t:a", "t:b")];
		let layout = layout_seeded(&nodes, &edges, &LayoutConfig::default(), 1);
		assert_eq!(layout.positions.len(), 2);
		assert_inside(&layout);
	}

	#[test]
	fn cache_reuses_unchanged_subgraph() {
		let (nodes, edges) = ring(8);
		let config = LayoutConfig::default();
		let mut cache = LayoutCache::new();
		let first = cache.get_or_compute(&nodes, &edges, &config).clone();
		let mut reversed = nodes.clone();
		reversed.reverse();
		let second = cache.get_or_compute(&reversed, &edges, &config).clone();
		assert_eq!(cache.computations(), 1);
		assert_eq!(first, second);

		cache.get_or_compute(&nodes[..4], &edges[..3], &config);
		assert_eq!(cache.computations(), 2);
	}

	#[test]
	fn positioned_nodes_carry_type_colors() {
		let (nodes, edges) = star(3);
		let layout = layout_seeded(&nodes, &edges, &LayoutConfig::default(), 1);
		let mut colors = TypeColors::new();
		let placed = position_nodes(&nodes, &layout, &mut colors);
		assert_eq!(placed.len(), 4);
		assert_eq!(placed[0].color, crate::engine::color::color_for_type("hub"));
		assert_eq!(placed[0].x, layout.positions["hub:center"].x);
	}
}
