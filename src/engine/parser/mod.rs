//! Fact text parser: answer text in, [`ParsedGraphResult`] out.
//!
//! The backend embeds a facts block and a sources block in its prose:
//!
//! ```text
//! Answer: Our risk team covers fraud.
//! Retrieved Facts: • (service:"risk mgmt") -[ADDRESSES]-> (risk:"fraud") [1]
//! Sources: [1] https://a.com
//! ```
//!
//! Anything before the `Answer:` line is preamble. Items that do not match the
//! grammar are skipped and counted, never fatal.

mod entity;
mod grouped;
mod lexer;

use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};

pub use entity::parse_entity;
pub use lexer::{Direction, Segment, collect_citations, segments};

use self::lexer::Cursor;
use crate::engine::model::{Edge, KnowledgeGraph, Node, ParsedGraphResult, distinct_types};

/// Line prefix separating diagnostic preamble from the answer.
pub const ANSWER_MARKER: &str = "Answer:";
/// Start of the facts block.
pub const FACTS_MARKER: &str = "Retrieved Facts:";
/// Start of the `[n] url` source list.
pub const SOURCES_MARKER: &str = "Sources:";
/// Separator between fact items.
pub const BULLET: char = '•';

/// Parses `text` with no prior source table. See [`FactParser::parse`].
pub fn parse(text: &str) -> Option<ParsedGraphResult> {
	FactParser::new().parse(text)
}

/// Fact text parser, optionally seeded with a citation table supplied
/// out-of-band (e.g. the payload's `sources` array).
#[derive(Clone, Debug, Default)]
pub struct FactParser {
	known_sources: BTreeMap<u32, String>,
}

impl FactParser {
	/// A parser with an empty citation table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Citations resolve against `sources` unless the text carries its own
	/// `Sources:` entry for the same index.
	pub fn with_sources(sources: BTreeMap<u32, String>) -> Self {
		Self {
			known_sources: sources,
		}
	}

	/// Returns `None` when the text has no facts block, no sources block and
	/// no preamble: there is nothing to visualize and the text should be shown
	/// as-is.
	pub fn parse(&self, text: &str) -> Option<ParsedGraphResult> {
		let (preamble, working) = split_preamble(text);
		let facts_at = find_marker(working, FACTS_MARKER, 0);
		let sources_from = facts_at.map_or(0, |at| at + FACTS_MARKER.len());
		let sources_at = find_marker(working, SOURCES_MARKER, sources_from);

		if facts_at.is_none() && sources_at.is_none() && preamble.is_none() {
			return None;
		}

		let clean_end = facts_at.or(sources_at).unwrap_or(working.len());
		let clean_text = working[..clean_end].trim().to_string();

		let mut sources = self.known_sources.clone();
		if let Some(at) = sources_at {
			sources.extend(parse_sources(&working[at + SOURCES_MARKER.len()..]));
		}

		let mut builder = GraphBuilder::new(&sources);
		if let Some(at) = facts_at {
			let body = &working[at + FACTS_MARKER.len()..sources_at.unwrap_or(working.len())];
			builder.bullets(body);
			if !builder.has_edges() {
				let mut fallback = GraphBuilder::new(&sources);
				grouped::parse_grouped(body.lines(), &mut fallback);
				if fallback.has_edges() {
					trace!("bullet grammar found nothing, using grouped layout");
					builder = fallback;
				}
			}
		}

		let (graph, skipped_items) = builder.finish();
		debug!(
			"parsed {} nodes, {} edges, {} sources ({} items skipped)",
			graph.nodes.len(),
			graph.edges.len(),
			sources.len(),
			skipped_items
		);
		Some(ParsedGraphResult {
			clean_text,
			graph,
			source_index_to_url: sources,
			preamble,
			skipped_items,
		})
	}

	/// Parses a list of fact lines delivered outside the answer text. The
	/// lines are tried as a facts block first and then in the grouped
	/// layout. Returns `None` unless a graph comes out of it.
	pub fn parse_preview(&self, lines: &[String]) -> Option<ParsedGraphResult> {
		if lines.iter().all(|l| l.trim().is_empty()) {
			return None;
		}
		let joined = lines.join("\n");
		let text = if find_marker(&joined, FACTS_MARKER, 0).is_some() {
			joined
		} else {
			format!("{FACTS_MARKER}\n{joined}")
		};
		self.parse(&text).filter(|r| !r.graph.is_empty())
	}
}

/// The answer with any preamble and the `Answer:` marker cut off, trimmed.
/// Text without a marker is returned trimmed.
pub fn answer_body(text: &str) -> &str {
	split_preamble(text).1.trim()
}

/// Splits at the first line starting with [`ANSWER_MARKER`]. Returns the
/// trimmed preamble (if non-empty) and the text after the marker.
fn split_preamble(text: &str) -> (Option<String>, &str) {
	let mut offset = 0;
	for line in text.split_inclusive('\n') {
		let indent = line.len() - line.trim_start().len();
		let head = &line[indent..];
		let is_marker = head
			.get(..ANSWER_MARKER.len())
			.is_some_and(|p| p.eq_ignore_ascii_case(ANSWER_MARKER));
		if is_marker {
			let preamble = text[..offset].trim();
			let working = &text[offset + indent + ANSWER_MARKER.len()..];
			return ((!preamble.is_empty()).then(|| preamble.to_string()), working);
		}
		offset += line.len();
	}
	(None, text)
}

/// Finds `marker` (ASCII case-insensitive) at or after byte `from`, only where
/// it starts the text or follows whitespace.
pub(crate) fn find_marker(haystack: &str, marker: &str, from: usize) -> Option<usize> {
	let tail = haystack.get(from..)?;
	let mut prev = haystack[..from].chars().next_back();
	for (i, c) in tail.char_indices() {
		let at = from + i;
		if prev.is_none_or(char::is_whitespace)
			&& haystack
				.get(at..at + marker.len())
				.is_some_and(|s| s.eq_ignore_ascii_case(marker))
		{
			return Some(at);
		}
		prev = Some(c);
	}
	None
}

/// Reads `[n] url` pairs. Entries without a url are ignored.
fn parse_sources(body: &str) -> BTreeMap<u32, String> {
	let mut sources = BTreeMap::new();
	let mut cursor = Cursor::new(body);
	while let Some(c) = cursor.peek() {
		if c != '[' {
			cursor.bump();
			continue;
		}
		let mark = cursor.mark();
		cursor.bump();
		let digits = cursor.take_while(|c| c.is_ascii_digit());
		let index = digits.parse::<u32>().ok();
		match (index, cursor.expect(']')) {
			(Some(index), Some(())) => {
				cursor.skip_while(char::is_whitespace);
				if cursor.peek() == Some('[') {
					continue;
				}
				let url = cursor.take_while(|c| !c.is_whitespace());
				if !url.is_empty() {
					sources.insert(index, url.to_string());
				}
			}
			_ => {
				cursor.reset(mark);
				cursor.bump();
			}
		}
	}
	sources
}

/// Accumulates nodes (merged by id) and edges (one per occurrence).
pub(crate) struct GraphBuilder<'s> {
	sources: &'s BTreeMap<u32, String>,
	nodes: Vec<Node>,
	index: HashMap<String, usize>,
	edges: Vec<Edge>,
	skipped: usize,
}

impl<'s> GraphBuilder<'s> {
	pub fn new(sources: &'s BTreeMap<u32, String>) -> Self {
		Self {
			sources,
			nodes: Vec::new(),
			index: HashMap::new(),
			edges: Vec::new(),
			skipped: 0,
		}
	}

	/// Parses every bullet of a facts block body.
	fn bullets(&mut self, body: &str) {
		if !body.contains(BULLET) {
			for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
				if !self.triple(line) {
					self.skip(line);
				}
			}
			return;
		}
		let leading_text = !body.trim_start().starts_with(BULLET);
		for (i, item) in body.split(BULLET).enumerate() {
			let item = item.trim();
			if item.is_empty() {
				continue;
			}
			// Prose before the first bullet only counts when it parses.
			if !self.triple(item) && !(i == 0 && leading_text) {
				self.skip(item);
			}
		}
	}

	/// Parses the first `(A) -[REL]-> (B)` in `item`. Returns false if the item
	/// has no usable triple.
	pub fn triple(&mut self, item: &str) -> bool {
		let segs = segments(item);
		let significant: Vec<&Segment> = segs
			.iter()
			.filter(|s| !s.is_blank() && !matches!(s, Segment::Citations(_)))
			.collect();
		let found = significant.windows(3).find_map(|w| match (w[0], w[1], w[2]) {
			(Segment::Entity(a), Segment::Relation { label, direction }, Segment::Entity(b)) => {
				Some((*a, *label, *direction, *b))
			}
			_ => None,
		});
		let Some((a, label, direction, b)) = found else {
			return false;
		};
		let (Some(a), Some(b)) = (parse_entity(a), parse_entity(b)) else {
			return false;
		};
		let citations = collect_citations(&segs);
		let (a, b) = (self.add_node(a), self.add_node(b));
		match direction {
			Direction::Outgoing => self.add_edge(a, b, label, citations),
			Direction::Incoming => self.add_edge(b, a, label, citations),
		}
		true
	}

	pub fn skip(&mut self, item: &str) {
		trace!("skipping unparseable fact item: {item}");
		self.skipped += 1;
	}

	/// Registers `node`, merging into an earlier mention with the same id.
	pub fn add_node(&mut self, node: Node) -> String {
		let id = node.id.clone();
		match self.index.get(&id) {
			Some(&i) => self.nodes[i].merge(node),
			None => {
				self.index.insert(id.clone(), self.nodes.len());
				self.nodes.push(node);
			}
		}
		id
	}

	pub fn add_edge(&mut self, source: String, target: String, label: &str, citations: Vec<u32>) {
		let citation_urls = citations
			.iter()
			.filter_map(|i| self.sources.get(i).cloned())
			.collect();
		self.edges.push(Edge {
			id: format!("e{}", self.edges.len()),
			source_node_id: source,
			target_node_id: target,
			relation_label: label.to_string(),
			citation_urls,
			citation_indices: citations,
		});
	}

	pub fn has_edges(&self) -> bool {
		!self.edges.is_empty()
	}

	pub fn finish(self) -> (KnowledgeGraph, usize) {
		let types = distinct_types(&self.nodes);
		let graph = KnowledgeGraph {
			nodes: self.nodes,
			edges: self.edges,
			types,
		};
		(graph, self.skipped)
	}
}
