use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};
use super::layout::LayoutConfig;

/// Settings for the explorer: layout parameters plus presentation limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplorerConfig {
	/// Force simulation parameters.
	pub layout: LayoutConfig,
	/// How many citation indices a node badge shows before "+N".
	pub citation_badge_limit: usize,
}

impl Default for ExplorerConfig {
	fn default() -> Self {
		Self {
			layout: LayoutConfig::default(),
			citation_badge_limit: 3,
		}
	}
}

impl ExplorerConfig {
	/// Reads a JSON config; missing fields take their defaults.
	pub fn from_json(json: &str) -> EngineResult<Self> {
		let config: Self =
			serde_json::from_str(json).map_err(|source| EngineError::ConfigSyntax { source })?;
		config.validate()?;
		Ok(config)
	}

	/// Rejects parameters the simulation cannot run with.
	pub fn validate(&self) -> EngineResult<()> {
		let layout = &self.layout;
		let invalid = |field, reason| Err(EngineError::InvalidConfig { field, reason });
		if layout.iterations == 0 {
			return invalid("layout.iterations", "must be positive");
		}
		if !(layout.damping > 0.0 && layout.damping < 1.0) {
			return invalid("layout.damping", "must be between 0 and 1");
		}
		if !(layout.min_temperature > 0.0 && layout.min_temperature <= 1.0) {
			return invalid("layout.minTemperature", "must be in (0, 1]");
		}
		if !(layout.base_canvas > 0.0) || layout.canvas_per_node < 0.0 {
			return invalid("layout.baseCanvas", "canvas must have a positive size");
		}
		if !(layout.min_node_size > 0.0 && layout.min_node_size <= layout.max_node_size) {
			return invalid("layout.minNodeSize", "must be positive and at most maxNodeSize");
		}
		if layout.base_canvas / 2.0 <= layout.max_node_size {
			return invalid("layout.maxNodeSize", "must be smaller than half the canvas");
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		ExplorerConfig::default().validate().unwrap();
	}

	#[test]
	fn partial_json_fills_defaults() {
		let config = ExplorerConfig::from_json(r#"{"layout": {"iterations": 40, "seed": null}}"#).unwrap();
		assert_eq!(config.layout.iterations, 40);
		assert_eq!(config.layout.seed, None);
		assert_eq!(config.citation_badge_limit, 3);
		assert_eq!(config.layout.damping, LayoutConfig::default().damping);
	}

	#[test]
	fn rejects_bad_values() {
		let err = ExplorerConfig::from_json(r#"{"layout": {"damping": 1.5}}"#).unwrap_err();
		assert!(matches!(err, EngineError::InvalidConfig { field: "layout.damping", .. }));
		let err = ExplorerConfig::from_json(r#"{"layout": {"iterations": 0}}"#).unwrap_err();
		assert!(matches!(err, EngineError::InvalidConfig { field: "layout.iterations", .. }));
		assert!(matches!(
			ExplorerConfig::from_json("{").unwrap_err(),
			EngineError::ConfigSyntax { .. }
		));
	}
}
