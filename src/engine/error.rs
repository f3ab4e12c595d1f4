use thiserror::Error;

/// Errors at the engine's JSON boundary. Parsing, layout and filtering never
/// fail; only decoding payloads and configuration can.
#[derive(Debug, Error)]
pub enum EngineError {
	/// The backend payload is not valid JSON or has no usable shape.
	#[error("malformed backend payload: {source}")]
	Payload {
		/// Underlying decode error.
		#[source]
		source: serde_json::Error,
	},

	/// A full-graph snapshot did not decode.
	#[error("malformed full-graph snapshot: {source}")]
	Snapshot {
		/// Underlying decode error.
		#[source]
		source: serde_json::Error,
	},

	/// The config file is not valid JSON.
	#[error("malformed explorer config: {source}")]
	ConfigSyntax {
		/// Underlying decode error.
		#[source]
		source: serde_json::Error,
	},

	/// A config value is out of range.
	#[error("invalid explorer config: {field} {reason}")]
	InvalidConfig {
		/// Dotted path of the offending field.
		field: &'static str,
		/// What the value must satisfy.
		reason: &'static str,
	},
}

/// Result alias for fallible engine entry points.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
