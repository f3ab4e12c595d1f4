//! Backend payloads and their normalization into one response shape.
//!
//! The retrieval backend answers in one of two shapes. Both are modelled as
//! [`BackendPayload`] and normalized immediately into [`NormalizedResponse`];
//! nothing past this module branches on the shape.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{EngineError, EngineResult};
use super::model::{Edge, KnowledgeGraph, Node, ParsedGraphResult};
use super::parser::{FactParser, answer_body};

// =============================================================================
// WIRE SHAPES
// =============================================================================

/// One entry of the payload's `sources` array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
	/// Citation index used in `[n]` tokens.
	pub id: u32,
	/// Empty when the backend sent `null`.
	#[serde(default, deserialize_with = "null_as_default")]
	pub url: String,
}

/// A research hit: a source page and the snippet that matched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
	/// Page title, when the backend had one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Page the snippet came from.
	#[serde(default, deserialize_with = "null_as_default")]
	pub url: String,
	/// Matched text.
	#[serde(default, deserialize_with = "null_as_default")]
	pub snippet: String,
}

/// What the backend looked for and what it found.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Research {
	/// Topics the backend searched for.
	#[serde(default, deserialize_with = "null_as_default")]
	pub targets: Vec<String>,
	/// Hits, in backend order.
	#[serde(default, deserialize_with = "null_as_default")]
	pub findings: Vec<Finding>,
}

/// A follow-up the backend proposes to the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAction {
	/// Short action name.
	#[serde(default, deserialize_with = "null_as_default")]
	pub action: String,
	/// Human-readable explanation.
	#[serde(default, deserialize_with = "null_as_default")]
	pub description: String,
}

/// `structured_response` of the newer payload shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResponse {
	/// Research targets and findings.
	#[serde(rename = "Research", default, deserialize_with = "null_as_default")]
	pub research: Research,
	/// Answer text, possibly carrying fact and source blocks.
	#[serde(rename = "Chat_Response", default, deserialize_with = "null_as_default")]
	pub chat_response: String,
	/// Follow-ups, in backend order.
	#[serde(rename = "Suggested_Actions", default, deserialize_with = "null_as_default")]
	pub suggested_actions: Vec<SuggestedAction>,
}

/// Newer backend shape: answer text plus research and suggested actions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredPayload {
	/// Tenant the question was asked for.
	#[serde(default, deserialize_with = "null_as_default")]
	pub tenant: String,
	/// The user's question.
	#[serde(default, deserialize_with = "null_as_default")]
	pub question: String,
	/// The answer and its research context.
	#[serde(default, deserialize_with = "null_as_default")]
	pub structured_response: StructuredResponse,
	/// Citation table for `[n]` tokens.
	#[serde(default, deserialize_with = "null_as_default")]
	pub sources: Vec<SourceRef>,
	/// Fact lines delivered outside the answer text.
	#[serde(rename = "factsPreview", default)]
	pub facts_preview: Option<Vec<String>>,
}

impl StructuredPayload {
	/// Keeps whatever top-level fields still read as the expected types when
	/// the full shape does not decode. The answer text survives as long as
	/// `Chat_Response` is a string.
	fn salvage(value: &Value) -> Self {
		let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_string();
		let response = value.get("structured_response");
		Self {
			tenant: text(value.get("tenant")),
			question: text(value.get("question")),
			structured_response: StructuredResponse {
				chat_response: text(response.and_then(|r| r.get("Chat_Response"))),
				..StructuredResponse::default()
			},
			sources: value
				.get("sources")
				.and_then(|v| Vec::<SourceRef>::deserialize(v).ok())
				.unwrap_or_default(),
			facts_preview: value
				.get("factsPreview")
				.and_then(|v| Option::<Vec<String>>::deserialize(v).ok())
				.flatten(),
		}
	}
}

/// Older backend shape: a bare answer string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPayload {
	/// Tenant the question was asked for.
	#[serde(default, deserialize_with = "null_as_default")]
	pub tenant: String,
	/// The user's question.
	#[serde(default, deserialize_with = "null_as_default")]
	pub question: String,
	/// Answer text; `null` reads as empty.
	#[serde(default)]
	pub answer: Option<String>,
	/// Citation table for `[n]` tokens.
	#[serde(default, deserialize_with = "null_as_default")]
	pub sources: Vec<SourceRef>,
	/// Fact lines delivered outside the answer text.
	#[serde(rename = "factsPreview", default)]
	pub facts_preview: Option<Vec<String>>,
}

/// Reads `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Either backend shape. A payload carrying a `structured_response` key is
/// structured; anything else is read as legacy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BackendPayload {
	/// Has a `structured_response` key.
	Structured(StructuredPayload),
	/// Anything else.
	Legacy(LegacyPayload),
}

impl<'de> Deserialize<'de> for BackendPayload {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = Value::deserialize(deserializer)?;
		if value.get("structured_response").is_none() {
			return LegacyPayload::deserialize(value)
				.map(Self::Legacy)
				.map_err(de::Error::custom);
		}
		match StructuredPayload::deserialize(&value) {
			Ok(payload) => Ok(Self::Structured(payload)),
			Err(err) => {
				warn!("structured payload partly malformed, keeping the answer text: {err}");
				Ok(Self::Structured(StructuredPayload::salvage(&value)))
			}
		}
	}
}

impl BackendPayload {
	/// Decodes a raw payload. Fails only on invalid JSON or a legacy payload
	/// that is not an object of the expected shape.
	pub fn from_json(json: &str) -> EngineResult<Self> {
		serde_json::from_str(json).map_err(|source| {
			warn!("backend payload did not decode: {source}");
			EngineError::Payload { source }
		})
	}
}

// =============================================================================
// NORMALIZED RESPONSE
// =============================================================================

/// The single shape the rest of the app consumes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResponse {
	/// Answer prose with fact blocks removed when a graph was extracted. Without
	/// a graph it is the answer minus any preamble, or the untouched answer when
	/// the parser found nothing at all.
	pub chat_response: String,
	/// Empty for legacy payloads.
	pub research_targets: Vec<String>,
	/// Empty for legacy payloads.
	pub research_findings: Vec<Finding>,
	/// Empty for legacy payloads.
	pub suggested_actions: Vec<SuggestedAction>,
	/// Graph from the answer, or from the facts preview when the answer has none.
	#[serde(flatten)]
	pub graph: KnowledgeGraph,
	/// Payload sources merged with any textual `Sources:` block.
	pub source_index_to_url: BTreeMap<u32, String>,
	/// Diagnostic prose before `Answer:`, shown apart from the answer.
	pub preamble: Option<String>,
	/// Whether the payload was the structured shape.
	pub has_structured_data: bool,
	/// Fact items that did not parse.
	pub skipped_items: usize,
}

impl NormalizedResponse {
	/// At least one node or edge.
	pub fn has_graph_data(&self) -> bool {
		!self.graph.nodes.is_empty() || !self.graph.edges.is_empty()
	}

	/// At least one research target or finding.
	pub fn has_research_data(&self) -> bool {
		!self.research_targets.is_empty() || !self.research_findings.is_empty()
	}

	/// A preamble or a source table worth showing in the debug panel.
	pub fn has_debug_data(&self) -> bool {
		self.preamble.as_deref().is_some_and(|p| !p.is_empty()) || !self.source_index_to_url.is_empty()
	}
}

/// Decodes and normalizes a raw payload.
pub fn normalize_json(json: &str) -> EngineResult<NormalizedResponse> {
	BackendPayload::from_json(json).map(normalize)
}

/// Maps either payload shape onto [`NormalizedResponse`]. Never fails.
pub fn normalize(payload: BackendPayload) -> NormalizedResponse {
	match payload {
		BackendPayload::Structured(p) => {
			let extraction = extract(&p.structured_response.chat_response, p.facts_preview.as_deref(), &p.sources);
			let StructuredResponse {
				research,
				suggested_actions,
				..
			} = p.structured_response;
			info!("normalized structured response ({} nodes)", extraction.graph.nodes.len());
			NormalizedResponse {
				research_targets: research.targets,
				research_findings: research.findings,
				suggested_actions,
				has_structured_data: true,
				..extraction.into_response()
			}
		}
		BackendPayload::Legacy(p) => {
			let answer = p.answer.unwrap_or_default();
			let extraction = extract(&answer, p.facts_preview.as_deref(), &p.sources);
			info!("normalized legacy response ({} nodes)", extraction.graph.nodes.len());
			NormalizedResponse {
				has_structured_data: false,
				..extraction.into_response()
			}
		}
	}
}

struct Extraction {
	chat_response: String,
	graph: KnowledgeGraph,
	source_index_to_url: BTreeMap<u32, String>,
	preamble: Option<String>,
	skipped_items: usize,
}

impl Extraction {
	fn into_response(self) -> NormalizedResponse {
		NormalizedResponse {
			chat_response: self.chat_response,
			graph: self.graph,
			source_index_to_url: self.source_index_to_url,
			preamble: self.preamble,
			skipped_items: self.skipped_items,
			..NormalizedResponse::default()
		}
	}
}

/// Runs the parser over the answer, then over the facts preview when the
/// answer carries no graph.
fn extract(answer: &str, preview: Option<&[String]>, sources: &[SourceRef]) -> Extraction {
	let known: BTreeMap<u32, String> = sources.iter().map(|s| (s.id, s.url.clone())).collect();
	let parser = FactParser::with_sources(known.clone());

	let primary = parser.parse(answer);
	let from_answer = primary.as_ref().is_some_and(|r| !r.graph.is_empty());
	let from_preview = if from_answer {
		None
	} else {
		preview.and_then(|lines| parser.parse_preview(lines))
	};
	if from_preview.is_some() {
		debug!("graph taken from facts preview");
	}

	let graph_source: Option<&ParsedGraphResult> = if from_answer {
		primary.as_ref()
	} else {
		from_preview.as_ref()
	};
	let graph = graph_source.map(|r| r.graph.clone()).unwrap_or_default();

	// A preamble never reaches the chat text, even when no graph came out.
	let chat_response = match &primary {
		Some(r) if !graph.is_empty() => r.clean_text.clone(),
		Some(_) => answer_body(answer).to_string(),
		None => answer.to_string(),
	};

	let mut source_index_to_url = known;
	for result in [primary.as_ref(), from_preview.as_ref()].into_iter().flatten() {
		source_index_to_url.extend(result.source_index_to_url.clone());
	}

	Extraction {
		chat_response,
		graph,
		source_index_to_url,
		preamble: primary.as_ref().and_then(|r| r.preamble.clone()),
		skipped_items: graph_source.or(primary.as_ref()).map_or(0, |r| r.skipped_items),
	}
}

// =============================================================================
// FULL GRAPH
// =============================================================================

/// A whole-graph dump in the canonical shape, fetched per tenant without going
/// through text parsing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullGraphSnapshot {
	/// Tenant the graph belongs to.
	#[serde(default)]
	pub tenant: String,
	/// Canonical nodes; duplicate ids are merged on conversion.
	#[serde(default)]
	pub nodes: Vec<Node>,
	/// Canonical edges; dangling ones are dropped on conversion.
	#[serde(default)]
	pub edges: Vec<Edge>,
}

impl FullGraphSnapshot {
	/// Decodes a snapshot; missing arrays read as empty.
	pub fn from_json(json: &str) -> EngineResult<Self> {
		serde_json::from_str(json).map_err(|source| EngineError::Snapshot { source })
	}

	/// Merges nodes sharing an id, derives types and drops edges pointing at
	/// unknown nodes.
	pub fn into_graph(self) -> KnowledgeGraph {
		debug!(
			"full graph for tenant {:?}: {} nodes, {} edges",
			self.tenant,
			self.nodes.len(),
			self.edges.len()
		);
		KnowledgeGraph::from_parts(self.nodes, self.edges)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const FACTS: &str = "Fraud is covered.\nRetrieved Facts: • (service:\"risk mgmt\") -[ADDRESSES]-> (risk:\"fraud\") [1]\nSources:\n[1] https://a.com";

	fn structured(chat: &str, preview: Option<Vec<&str>>) -> String {
		serde_json::json!({
			"tenant": "acme",
			"question": "who handles fraud?",
			"structured_response": {
				"Research": {
					"targets": ["fraud"],
					"findings": [{"url": "https://f.com", "snippet": "..."}]
				},
				"Chat_Response": chat,
				"Suggested_Actions": [{"action": "review", "description": "Review controls"}]
			},
			"sources": [{"id": 2, "url": "https://b.com"}],
			"factsPreview": preview,
		})
		.to_string()
	}

	#[test]
	fn structured_payload_with_fact_block() {
		let response = normalize_json(&structured(FACTS, None)).unwrap();
		assert!(response.has_structured_data);
		assert_eq!(response.chat_response, "Fraud is covered.");
		assert_eq!(response.graph.nodes.len(), 2);
		assert_eq!(response.research_targets, vec!["fraud"]);
		assert_eq!(response.research_findings[0].url, "https://f.com");
		assert_eq!(response.suggested_actions[0].action, "review");
		assert_eq!(response.source_index_to_url.len(), 2);
		assert!(response.has_graph_data());
		assert!(response.has_research_data());
		assert!(response.has_debug_data());
	}

	#[test]
	fn structured_without_graph_keeps_text_verbatim() {
		let response = normalize_json(&structured("Just an answer.", None)).unwrap();
		assert!(response.has_structured_data);
		assert_eq!(response.chat_response, "Just an answer.");
		assert!(!response.has_graph_data());
	}

	#[test]
	fn malformed_facts_do_not_eat_the_answer() {
		let chat = "Intro.\nRetrieved Facts: • nonsense";
		let response = normalize_json(&structured(chat, None)).unwrap();
		assert_eq!(response.chat_response, chat);
		assert_eq!(response.skipped_items, 1);
	}

	#[test]
	fn structured_falls_back_to_facts_preview() {
		let preview = vec!["(org:\"Acme\") -[OWNS]-> (brand:\"Widget\") [2]"];
		let response = normalize_json(&structured("Plain answer.", Some(preview))).unwrap();
		assert_eq!(response.chat_response, "Plain answer.");
		assert_eq!(response.graph.edges.len(), 1);
		assert_eq!(response.graph.edges[0].citation_urls, vec!["https://b.com"]);
	}

	#[test]
	fn preview_in_grouped_layout() {
		let preview = vec!["(org:\"Acme\")", "-[OWNS]-> (brand:\"Widget\")", "<-[AUDITS]- (org:\"KPMG\")"];
		let response = normalize_json(&structured("Plain answer.", Some(preview))).unwrap();
		assert_eq!(response.graph.edges.len(), 2);
		assert_eq!(response.graph.types, vec!["brand", "org"]);
	}

	#[test]
	fn legacy_payload() {
		let json = serde_json::json!({
			"tenant": "acme",
			"question": "q",
			"answer": FACTS,
			"sources": [],
		})
		.to_string();
		let response = normalize_json(&json).unwrap();
		assert!(!response.has_structured_data);
		assert_eq!(response.chat_response, "Fraud is covered.");
		assert!(response.research_targets.is_empty());
		assert!(response.suggested_actions.is_empty());
		assert_eq!(response.graph.edges[0].citation_urls, vec!["https://a.com"]);
	}

	#[test]
	fn legacy_null_answer() {
		let json = r#"{"tenant": "acme", "question": "q", "answer": null, "sources": []}"#;
		let response = normalize_json(json).unwrap();
		assert_eq!(response.chat_response, "");
		assert!(!response.has_graph_data());
		assert!(!response.has_debug_data());
	}

	#[test]
	fn preamble_is_kept_apart() {
		let answer = "retrieval took 3 hops\nAnswer: Fraud is covered.\nRetrieved Facts: • (a:\"x\") -[R]-> (b:\"y\")";
		let payload = BackendPayload::Legacy(LegacyPayload {
			answer: Some(answer.into()),
			..LegacyPayload::default()
		});
		let response = normalize(payload);
		assert_eq!(response.preamble.as_deref(), Some("retrieval took 3 hops"));
		assert_eq!(response.chat_response, "Fraud is covered.");
	}

	#[test]
	fn preamble_without_graph_stays_out_of_chat() {
		let json = serde_json::json!({
			"answer": "retrieval took 3 hops\nAnswer: Fraud is covered by the risk team.",
		})
		.to_string();
		let response = normalize_json(&json).unwrap();
		assert!(!response.has_graph_data());
		assert_eq!(response.chat_response, "Fraud is covered by the risk team.");
		assert_eq!(response.preamble.as_deref(), Some("retrieval took 3 hops"));
	}

	#[test]
	fn null_fields_inside_structured_response() {
		let json = serde_json::json!({
			"tenant": null,
			"structured_response": {
				"Research": {
					"targets": ["fraud"],
					"findings": [{"title": null, "url": "https://f.com", "snippet": null}]
				},
				"Chat_Response": FACTS,
				"Suggested_Actions": [{"action": "review"}]
			},
			"sources": null,
		})
		.to_string();
		let response = normalize_json(&json).unwrap();
		assert!(response.has_structured_data);
		assert_eq!(response.research_targets, vec!["fraud"]);
		assert_eq!(response.research_findings[0].snippet, "");
		assert_eq!(response.suggested_actions[0].description, "");
		assert_eq!(response.chat_response, "Fraud is covered.");
		assert_eq!(response.graph.edges.len(), 1);
	}

	#[test]
	fn null_chat_response_is_still_structured() {
		let json = r#"{"structured_response": {"Chat_Response": null, "Research": null}}"#;
		let response = normalize_json(json).unwrap();
		assert!(response.has_structured_data);
		assert_eq!(response.chat_response, "");
		assert!(!response.has_research_data());
	}

	#[test]
	fn mistyped_structured_field_keeps_the_answer() {
		let json = serde_json::json!({
			"question": "who handles fraud?",
			"structured_response": {
				"Research": {"targets": "fraud"},
				"Chat_Response": FACTS,
				"Suggested_Actions": 3
			},
			"sources": [{"id": 2, "url": "https://b.com"}],
		})
		.to_string();
		let payload = BackendPayload::from_json(&json).unwrap();
		let BackendPayload::Structured(ref structured) = payload else {
			panic!("expected the structured shape, got {payload:?}");
		};
		assert_eq!(structured.question, "who handles fraud?");
		assert_eq!(structured.sources.len(), 1);

		let response = normalize(payload);
		assert!(response.has_structured_data);
		assert!(response.research_targets.is_empty());
		assert!(response.suggested_actions.is_empty());
		assert_eq!(response.chat_response, "Fraud is covered.");
		assert_eq!(response.source_index_to_url.len(), 2);
	}

	#[test]
	fn garbage_json_is_an_error() {
		assert!(matches!(normalize_json("not json"), Err(EngineError::Payload { .. })));
	}

	#[test]
	fn full_graph_snapshot() {
		let json = r#"{
			"tenant": "acme",
			"nodes": [
				{"id": "org:Acme", "type": "org", "label": "Acme", "attributes": {}},
				{"id": "brand:Widget", "type": "brand", "label": "Widget"},
				{"id": "org:Acme", "type": "org", "label": "Acme", "attributes": {"country": "UK"}}
			],
			"edges": [
				{"id": "x1", "sourceNodeId": "org:Acme", "targetNodeId": "brand:Widget", "relationLabel": "OWNS"},
				{"id": "x2", "sourceNodeId": "org:Acme", "targetNodeId": "brand:Gone", "relationLabel": "OWNS"}
			]
		}"#;
		let graph = FullGraphSnapshot::from_json(json).unwrap().into_graph();
		assert_eq!(graph.nodes.len(), 2);
		assert_eq!(graph.node("org:Acme").unwrap().attributes["country"], "UK");
		assert_eq!(graph.edges.len(), 1);
		assert_eq!(graph.types, vec!["brand", "org"]);
	}
}
