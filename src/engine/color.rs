use std::collections::HashMap;

const COLORS: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

/// Stable color for an entity type. The same type gets the same color across
/// runs and processes.
pub fn color_for_type(node_type: &str) -> &'static str {
	COLORS[(fnv1a(node_type) % COLORS.len() as u64) as usize]
}

fn fnv1a(s: &str) -> u64 {
	s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
		(hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
	})
}

/// Memoized type colors, owned by whoever renders.
#[derive(Clone, Debug, Default)]
pub struct TypeColors {
	cache: HashMap<String, &'static str>,
}

impl TypeColors {
	/// An empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Color for `node_type`, computed on first use.
	pub fn get(&mut self, node_type: &str) -> &'static str {
		if let Some(&color) = self.cache.get(node_type) {
			return color;
		}
		let color = color_for_type(node_type);
		self.cache.insert(node_type.to_string(), color);
		color
	}

	/// Number of types seen so far.
	pub fn len(&self) -> usize {
		self.cache.len()
	}

	/// Whether no type has been colored yet.
	pub fn is_empty(&self) -> bool {
		self.cache.is_empty()
	}
}
