//! Browser-independent graph engine: text in, positioned and filtered graph
//! out. Nothing here touches the DOM, so it is tested natively.

/// Per-type colors.
pub mod color;
/// Explorer settings.
pub mod config;
/// Errors at the JSON boundary.
pub mod error;
/// Visible-subgraph queries.
pub mod filter;
/// Force-directed placement.
pub mod layout;
/// Canonical graph shapes.
pub mod model;
/// Backend payloads into one response shape.
pub mod normalize;
/// Fact text parser.
pub mod parser;

pub use config::ExplorerConfig;
pub use error::{EngineError, EngineResult};
pub use filter::{CitationBadge, FilterState, GraphQuery, VisibleGraph};
pub use layout::{Layout, LayoutCache, LayoutConfig, layout_seeded, layout_with_config};
pub use model::{Edge, KnowledgeGraph, Node, ParsedGraphResult, Point, PositionedNode};
pub use normalize::{BackendPayload, FullGraphSnapshot, NormalizedResponse, normalize, normalize_json};
pub use parser::{FactParser, parse};
