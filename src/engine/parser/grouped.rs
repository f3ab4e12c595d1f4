//! Grouped fact layout: a central entity line followed by continuation lines
//! that refer to it implicitly.
//!
//! ```text
//! (org:"Acme") [1]
//! -[OWNS]-> (brand:"Widget") [2]
//! <-[AUDITS]- (org:"Big Four")
//! ```

use super::GraphBuilder;
use super::entity::parse_entity;
use super::lexer::{Direction, Segment, collect_citations, segments};

enum Line<'a> {
	/// A complete `(A) -[R]-> (B)` on one line.
	Triple,
	/// A standalone entity: becomes the new central entity.
	Central(&'a str),
	/// `-[R]-> (B)` or `<-[R]- (B)` hanging off the central entity.
	Continuation {
		label: &'a str,
		direction: Direction,
		entity: &'a str,
	},
	Unknown,
}

fn classify<'a>(segs: &[Segment<'a>]) -> Line<'a> {
	let significant: Vec<&Segment<'a>> = segs
		.iter()
		.filter(|s| !s.is_blank() && !matches!(s, Segment::Citations(_)))
		.collect();
	match significant.as_slice() {
		[Segment::Entity(_), Segment::Relation { .. }, Segment::Entity(_), ..] => Line::Triple,
		[Segment::Entity(entity)] => Line::Central(*entity),
		[
			Segment::Relation { label, direction },
			Segment::Entity(entity),
			..,
		] => Line::Continuation {
			label: *label,
			direction: *direction,
			entity: *entity,
		},
		_ => Line::Unknown,
	}
}

/// Parses grouped lines into `builder`.
///
/// The central entity only changes when a standalone entity line appears; an
/// unparseable standalone line clears it so that following continuations are
/// not attached to the wrong entity.
pub(crate) fn parse_grouped<'a>(lines: impl IntoIterator<Item = &'a str>, builder: &mut GraphBuilder) {
	let mut central: Option<String> = None;

	for raw in lines {
		let line = raw.trim().trim_start_matches([super::BULLET, '*']).trim();
		if line.is_empty() {
			continue;
		}
		let segs = segments(line);
		match classify(&segs) {
			Line::Triple => {
				if !builder.triple(line) {
					builder.skip(line);
				}
			}
			Line::Central(span) => match parse_entity(span) {
				Some(mut node) => {
					node.citation_indices = collect_citations(&segs);
					central = Some(builder.add_node(node));
				}
				None => {
					central = None;
					builder.skip(line);
				}
			},
			Line::Continuation {
				label,
				direction,
				entity,
			} => {
				let (Some(hub), Some(node)) = (central.clone(), parse_entity(entity)) else {
					builder.skip(line);
					continue;
				};
				let other = builder.add_node(node);
				let citations = collect_citations(&segs);
				match direction {
					Direction::Outgoing => builder.add_edge(hub, other, label, citations),
					Direction::Incoming => builder.add_edge(other, hub, label, citations),
				}
			}
			Line::Unknown => builder.skip(line),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	fn run(text: &str) -> (crate::engine::model::KnowledgeGraph, usize) {
		let sources = BTreeMap::from([(1, "https://a.com".to_string())]);
		let mut builder = GraphBuilder::new(&sources);
		parse_grouped(text.lines(), &mut builder);
		builder.finish()
	}

	#[test]
	fn continuations_attach_to_latest_central() {
		let (graph, skipped) = run(
			"(org:\"Acme\")\n\
			 -[OWNS]-> (brand:\"Widget\") [1]\n\
			 (org:\"Globex\")\n\
			 -[OWNS]-> (brand:\"Gizmo\")\n\
			 <-[SUPPLIES]- (org:\"Initech\")",
		);
		assert_eq!(skipped, 0);
		assert_eq!(graph.edges.len(), 3);
		assert_eq!(graph.edges[0].source_node_id, "org:Acme");
		assert_eq!(graph.edges[0].citation_urls, vec!["https://a.com"]);
		assert_eq!(graph.edges[1].source_node_id, "org:Globex");
		assert_eq!(graph.edges[2].source_node_id, "org:Initech");
		assert_eq!(graph.edges[2].target_node_id, "org:Globex");
	}

	#[test]
	fn continuation_without_central_is_skipped() {
		let (graph, skipped) = run("-[OWNS]-> (brand:\"Widget\")\n(org:\"Acme\")");
		assert!(graph.edges.is_empty());
		assert_eq!(skipped, 1);
		assert_eq!(graph.nodes.len(), 1);
	}

	#[test]
	fn full_triple_lines_do_not_move_the_central_entity() {
		let (graph, _) = run(
			"• (org:\"Acme\")\n\
			 • (a:\"x\") -[R]-> (b:\"y\")\n\
			 • -[OWNS]-> (brand:\"Widget\")",
		);
		assert_eq!(graph.edges.len(), 2);
		assert_eq!(graph.edges[1].source_node_id, "org:Acme");
	}

	#[test]
	fn malformed_central_clears_state() {
		let (graph, skipped) = run("(org:\"Acme\")\n(broken)\n-[OWNS]-> (brand:\"Widget\")");
		assert!(graph.edges.is_empty());
		assert_eq!(skipped, 2);
	}
}
