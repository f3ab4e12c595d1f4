//! Entity span grammar.
//!
//! ```text
//! span      := pair ( sep? pair )*
//! pair      := key ':' quoted          -- first one is the primary type:"label"
//!            | key '=' (quoted | bare)
//!            | key ':' bare
//! sep       := ',' | whitespace
//! ```
//!
//! Stray tokens are skipped. A span with no `key:"quoted"` pair has no
//! primary and is rejected.

use super::lexer::Cursor;
use crate::engine::model::Node;

/// Parses the inside of `( ... )` into a node.
pub fn parse_entity(span: &str) -> Option<Node> {
	let mut primary: Option<(String, String)> = None;
	let mut attributes = Vec::new();
	let mut cursor = Cursor::new(span);

	loop {
		cursor.skip_while(|c| c.is_whitespace() || c == ',');
		if cursor.is_eof() {
			break;
		}
		let key = cursor.take_while(is_key_char);
		if key.is_empty() {
			cursor.bump();
			continue;
		}
		cursor.skip_while(char::is_whitespace);
		match cursor.peek() {
			Some(':') => {
				cursor.bump();
				cursor.skip_while(char::is_whitespace);
				if let Some(label) = cursor.quoted() {
					if primary.is_none() {
						primary = Some((key.to_string(), label));
					} else {
						attributes.push((key.to_string(), label));
					}
				} else {
					let value = bare_value(&mut cursor);
					if !value.is_empty() {
						attributes.push((key.to_string(), value.to_string()));
					}
				}
			}
			Some('=') => {
				cursor.bump();
				cursor.skip_while(char::is_whitespace);
				let value = match cursor.quoted() {
					Some(v) => v,
					None => bare_value(&mut cursor).to_string(),
				};
				attributes.push((key.to_string(), value));
			}
			_ => {}
		}
	}

	let (node_type, label) = primary?;
	let label = label.trim();
	if label.is_empty() {
		return None;
	}
	let mut node = Node::new(node_type, label);
	for (key, value) in attributes {
		match key.as_str() {
			"url" if node.url.is_none() => node.url = Some(value.clone()),
			"page" if node.page.is_none() => node.page = Some(value.clone()),
			_ => {}
		}
		node.attributes.entry(key).or_insert(value);
	}
	Some(node)
}

fn is_key_char(c: char) -> bool {
	c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn bare_value<'a>(cursor: &mut Cursor<'a>) -> &'a str {
	cursor
		.take_while(|c| !c.is_whitespace() && c != ',')
		.trim_matches('"')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn primary_pair_only() {
		let node = parse_entity(r#"service:"risk mgmt""#).unwrap();
		assert_eq!(node.node_type, "service");
		assert_eq!(node.label, "risk mgmt");
		assert_eq!(node.id, "service:risk mgmt");
		assert!(node.attributes.is_empty());
	}

	#[test]
	fn secondary_attributes_in_both_notations() {
		let node =
			parse_entity(r#"org:"Acme" country=UK, sector:"retail banking" url=https://acme.example/a?b=c"#)
				.unwrap();
		assert_eq!(node.attributes["country"], "UK");
		assert_eq!(node.attributes["sector"], "retail banking");
		assert_eq!(node.url.as_deref(), Some("https://acme.example/a?b=c"));
		assert_eq!(node.attributes["url"], "https://acme.example/a?b=c");
	}

	#[test]
	fn page_attribute_is_lifted() {
		let node = parse_entity(r#"doc:"Annual report" page=12"#).unwrap();
		assert_eq!(node.page.as_deref(), Some("12"));
	}

	#[test]
	fn missing_primary_is_rejected() {
		assert!(parse_entity("org=Acme").is_none());
		assert!(parse_entity("just words").is_none());
		assert!(parse_entity(r#"org:"  ""#).is_none());
	}

	#[test]
	fn first_quoted_pair_wins_as_primary() {
		let node = parse_entity(r#"person:"Ada" role:"engineer""#).unwrap();
		assert_eq!(node.id, "person:Ada");
		assert_eq!(node.attributes["role"], "engineer");
	}

	#[test]
	fn stray_tokens_are_skipped() {
		let node = parse_entity(r#"# risk:"fraud" ; level=high"#).unwrap();
		assert_eq!(node.id, "risk:fraud");
		assert_eq!(node.attributes["level"], "high");
	}
}
