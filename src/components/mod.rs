pub mod filter_panel;
pub mod force_graph;
