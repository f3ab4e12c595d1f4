//! Tokenizer for fact items.
//!
//! An item such as
//! `(service:"risk mgmt") -[ADDRESSES]-> (risk:"fraud") [1][2]`
//! is split into [`Segment`]s: entity spans, relation arrows, citation groups
//! and leftover text. Quoted strings are honored when looking for the closing
//! parenthesis of an entity span, so labels may contain `(`, `)` or `[n]`.

/// Direction of a relation arrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
	/// `-[REL]->`
	Outgoing,
	/// `<-[REL]-`
	Incoming,
}

/// One lexical piece of a fact item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment<'a> {
	/// Contents of a `( ... )` span, without the parentheses.
	Entity(&'a str),
	/// `-[L]->` or `<-[L]-`.
	Relation {
		/// Trimmed text between the brackets.
		label: &'a str,
		/// Which way the arrow points.
		direction: Direction,
	},
	/// `[n]` or `[n, m]`.
	Citations(Vec<u32>),
	/// Anything else, verbatim.
	Text(&'a str),
}

impl Segment<'_> {
	/// Whitespace-only text.
	pub fn is_blank(&self) -> bool {
		matches!(self, Segment::Text(t) if t.trim().is_empty())
	}
}

/// Splits an item into segments. Never fails: anything unrecognized ends up
/// in a [`Segment::Text`].
pub fn segments(input: &str) -> Vec<Segment<'_>> {
	let mut out = Vec::new();
	let mut cursor = Cursor::new(input);
	let mut text_start = 0;

	while let Some(c) = cursor.peek() {
		let start = cursor.pos;
		let matched = match c {
			'(' => entity_span(&mut cursor),
			'-' | '<' => relation_arrow(&mut cursor),
			'[' => citation_group(&mut cursor),
			_ => None,
		};
		match matched {
			Some(segment) => {
				if text_start < start {
					out.push(Segment::Text(&input[text_start..start]));
				}
				out.push(segment);
				text_start = cursor.pos;
			}
			None => {
				cursor.pos = start;
				cursor.bump();
			}
		}
	}
	if text_start < input.len() {
		out.push(Segment::Text(&input[text_start..]));
	}
	out
}

/// Every citation index in `segs`, deduplicated, in order of first appearance.
pub fn collect_citations(segs: &[Segment]) -> Vec<u32> {
	let mut indices = Vec::new();
	for seg in segs {
		if let Segment::Citations(group) = seg {
			for &index in group {
				if !indices.contains(&index) {
					indices.push(index);
				}
			}
		}
	}
	indices
}

fn entity_span<'a>(cursor: &mut Cursor<'a>) -> Option<Segment<'a>> {
	cursor.expect('(')?;
	let inner_start = cursor.pos;
	let mut depth = 1usize;
	while let Some(c) = cursor.peek() {
		match c {
			'"' | '\u{201c}' => {
				cursor.quoted()?;
				continue;
			}
			'(' => depth += 1,
			')' => {
				depth -= 1;
				if depth == 0 {
					let inner = &cursor.src[inner_start..cursor.pos];
					cursor.bump();
					return Some(Segment::Entity(inner));
				}
			}
			_ => {}
		}
		cursor.bump();
	}
	None
}

fn relation_arrow<'a>(cursor: &mut Cursor<'a>) -> Option<Segment<'a>> {
	let direction = if cursor.eat("<-[") {
		Direction::Incoming
	} else if cursor.eat("-[") {
		Direction::Outgoing
	} else {
		return None;
	};
	let label_start = cursor.pos;
	let label_len = cursor.rest().find(']')?;
	let label = cursor.src[label_start..label_start + label_len].trim();
	cursor.pos = label_start + label_len + 1;
	if label.is_empty() || label.contains(['[', '(', ')']) {
		return None;
	}
	let closed = match direction {
		Direction::Outgoing => cursor.eat("->"),
		Direction::Incoming => cursor.eat("-"),
	};
	closed.then_some(Segment::Relation { label, direction })
}

fn citation_group<'a>(cursor: &mut Cursor<'a>) -> Option<Segment<'a>> {
	cursor.expect('[')?;
	let len = cursor.rest().find(']')?;
	let inner = &cursor.rest()[..len];
	let indices = inner
		.split(',')
		.map(|part| part.trim().parse::<u32>().ok())
		.collect::<Option<Vec<_>>>()?;
	cursor.pos += len + 1;
	Some(Segment::Citations(indices))
}

/// Byte cursor over a `&str` that only ever stops on char boundaries.
#[derive(Clone, Debug)]
pub(crate) struct Cursor<'a> {
	src: &'a str,
	pos: usize,
}

impl<'a> Cursor<'a> {
	pub fn new(src: &'a str) -> Self {
		Self { src, pos: 0 }
	}

	pub fn rest(&self) -> &'a str {
		&self.src[self.pos..]
	}

	pub fn mark(&self) -> usize {
		self.pos
	}

	pub fn reset(&mut self, mark: usize) {
		self.pos = mark;
	}

	pub fn is_eof(&self) -> bool {
		self.pos >= self.src.len()
	}

	pub fn peek(&self) -> Option<char> {
		self.rest().chars().next()
	}

	pub fn bump(&mut self) -> Option<char> {
		let c = self.peek()?;
		self.pos += c.len_utf8();
		Some(c)
	}

	pub fn expect(&mut self, c: char) -> Option<()> {
		(self.peek() == Some(c)).then(|| {
			self.pos += c.len_utf8();
		})
	}

	pub fn eat(&mut self, prefix: &str) -> bool {
		if self.rest().starts_with(prefix) {
			self.pos += prefix.len();
			true
		} else {
			false
		}
	}

	pub fn take_while(&mut self, mut f: impl FnMut(char) -> bool) -> &'a str {
		let start = self.pos;
		while let Some(c) = self.peek() {
			if !f(c) {
				break;
			}
			self.pos += c.len_utf8();
		}
		&self.src[start..self.pos]
	}

	pub fn skip_while(&mut self, f: impl FnMut(char) -> bool) {
		self.take_while(f);
	}

	/// Reads a `"..."` (or curly-quoted) string, resolving `\"` escapes.
	/// On an unterminated string the cursor is left where it was.
	pub fn quoted(&mut self) -> Option<String> {
		let start = self.pos;
		let close = match self.bump()? {
			'"' => '"',
			'\u{201c}' => '\u{201d}',
			_ => {
				self.pos = start;
				return None;
			}
		};
		let mut value = String::new();
		while let Some(c) = self.bump() {
			match c {
				'\\' => match self.bump() {
					Some(escaped) => value.push(escaped),
					None => break,
				},
				c if c == close => return Some(value),
				c => value.push(c),
			}
		}
		self.pos = start;
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn significant<'a>(segments: &'a [Segment<'a>]) -> Vec<&'a Segment<'a>> {
		segments.iter().filter(|s| !s.is_blank()).collect()
	}

	#[test]
	fn splits_a_triple_with_citations() {
		let segs = segments(r#"(service:"risk mgmt") -[ADDRESSES]-> (risk:"fraud") [1][2]"#);
		let segs = significant(&segs);
		assert_eq!(segs[0], &Segment::Entity(r#"service:"risk mgmt""#));
		assert_eq!(
			segs[1],
			&Segment::Relation {
				label: "ADDRESSES",
				direction: Direction::Outgoing
			}
		);
		assert_eq!(segs[2], &Segment::Entity(r#"risk:"fraud""#));
		assert_eq!(segs[3], &Segment::Citations(vec![1]));
		assert_eq!(segs[4], &Segment::Citations(vec![2]));
	}

	#[test]
	fn incoming_arrow() {
		let segs = segments(r#"<-[OWNS]- (org:"Acme")"#);
		assert_eq!(
			segs[0],
			Segment::Relation {
				label: "OWNS",
				direction: Direction::Incoming
			}
		);
	}

	#[test]
	fn parentheses_inside_quotes_do_not_close_the_span() {
		let segs = segments(r#"(org:"Acme (UK) [3]") -[X]-> (a:"b")"#);
		assert_eq!(segs[0], Segment::Entity(r#"org:"Acme (UK) [3]""#));
	}

	#[test]
	fn unterminated_span_is_text() {
		let segs = segments(r#"(org:"Acme" -[X]-> "#);
		assert!(!segs.iter().any(|s| matches!(s, Segment::Entity(_))));
		assert!(segs.iter().any(|s| matches!(s, Segment::Relation { .. })));
	}

	#[test]
	fn citation_lists_and_non_numeric_brackets() {
		assert_eq!(collect_citations(&segments("see [2, 5] and [2] but not [x]")), vec![2, 5]);
		assert!(collect_citations(&segments("[RELATION]")).is_empty());
	}

	#[test]
	fn quoted_handles_escapes_and_curly_quotes() {
		let mut c = Cursor::new(r#""say \"hi\"" rest"#);
		assert_eq!(c.quoted().as_deref(), Some(r#"say "hi""#));
		let mut c = Cursor::new("\u{201c}curly\u{201d}");
		assert_eq!(c.quoted().as_deref(), Some("curly"));
		let mut c = Cursor::new(r#""open"#);
		assert_eq!(c.quoted(), None);
		assert_eq!(c.rest(), r#""open"#);
	}
}
