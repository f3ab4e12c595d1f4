use leptos::prelude::*;
use log::info;

use crate::components::filter_panel::FilterPanel;
use crate::components::force_graph::{ForceGraphCanvas, GraphData};
use crate::engine::color::TypeColors;
use crate::engine::config::ExplorerConfig;
use crate::engine::filter::{GraphQuery, VisibleGraph, citation_badges};
use crate::engine::layout::{LayoutCache, position_nodes};
use crate::engine::normalize::{NormalizedResponse, normalize_json};

/// Bundled backend response shown until a live backend is wired in.
const SAMPLE_PAYLOAD: &str = include_str!("../../demos/sample_payload.json");

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let config = ExplorerConfig::default();
	let loaded = normalize_json(SAMPLE_PAYLOAD).map(|response| {
		info!(
			"loaded sample response: {} nodes, {} edges",
			response.graph.nodes.len(),
			response.graph.edges.len()
		);
		view! { <Explorer response=response config=config /> }
	});

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>{loaded}</ErrorBoundary>
	}
}

/// Answer text, filter panel and graph canvas for one normalized response.
#[component]
fn Explorer(response: NormalizedResponse, config: ExplorerConfig) -> impl IntoView {
	let query = GraphQuery::new(response.graph.clone());
	let filter = RwSignal::new(query.reset_filter());
	let type_counts = query.type_counts();
	let relations = query.relation_types().to_vec();
	let (max_degree, isolate_count) = (query.max_degree(), query.isolate_count());
	let badges = citation_badges(&query.graph().edges, config.citation_badge_limit);
	let query = StoredValue::new(query);
	let cache = StoredValue::new(LayoutCache::new());
	let layout_config = config.layout;

	let visible = Memo::new(move |_| filter.with(|f| query.with_value(|q| q.view(f))));
	let graph_data = Memo::new(move |_| {
		visible.with(|view: &VisibleGraph| {
			let mut data = GraphData::default();
			cache.update_value(|cache| {
				let layout = cache.get_or_compute(&view.visible_nodes, &view.visible_edges, &layout_config);
				let positioned = position_nodes(&view.visible_nodes, layout, &mut TypeColors::new());
				data = GraphData::from_layout(positioned, view, layout, &badges);
			});
			data
		})
	});
	let total = response.graph.nodes.len();
	let status = move || {
		let shown = graph_data.with(|d| d.nodes.len());
		if graph_data.with(GraphData::is_empty) && total > 0 {
			"No nodes match the current filters".to_string()
		} else {
			format!("{shown} of {total} nodes")
		}
	};
	let on_reset = move |_: ()| filter.set(query.with_value(GraphQuery::reset_filter));

	view! {
		<div class="fullscreen-graph">
			<ForceGraphCanvas data=graph_data fullscreen=true />
			<div class="graph-overlay">
				<AnswerPanel response=response />
				<p class="subtitle">{status}</p>
			</div>
			{(total > 0)
				.then(|| {
					view! {
						<FilterPanel
							filter=filter
							type_counts=type_counts
							relations=relations
							max_degree=max_degree
							isolate_count=isolate_count
							on_reset=on_reset
						/>
					}
				})}
		</div>
	}
}

#[component]
fn AnswerPanel(response: NormalizedResponse) -> impl IntoView {
	let sources = response
		.source_index_to_url
		.iter()
		.map(|(index, url)| {
			view! {
				<li>
					{format!("[{index}] ")}
					<a href=url.clone() target="_blank">
						{url.clone()}
					</a>
				</li>
			}
		})
		.collect_view();
	let actions = response
		.suggested_actions
		.iter()
		.map(|a| {
			view! {
				<li>
					<strong>{a.action.clone()}</strong>
					{format!(": {}", a.description)}
				</li>
			}
		})
		.collect_view();
	let findings = response
		.research_findings
		.iter()
		.map(|f| {
			let title = f.title.clone().unwrap_or_else(|| f.url.clone());
			view! {
				<li>
					<a href=f.url.clone() target="_blank">
						{title}
					</a>
					{format!(" {}", f.snippet)}
				</li>
			}
		})
		.collect_view();
	let debug = response.has_debug_data().then(|| {
		let preamble = response.preamble.clone().unwrap_or_default();
		view! {
			<details class="debug">
				<summary>"Retrieval details"</summary>
				<pre>{preamble}</pre>
				<p>{format!("{} fact items skipped", response.skipped_items)}</p>
			</details>
		}
	});

	let research_heading = response.has_research_data().then(|| view! { <h2>"Research"</h2> });

	view! {
		<section class="answer">
			<h1>"Knowledge Graph"</h1>
			<p class="chat-response">{response.chat_response}</p>
			{research_heading}
			<ul class="findings">{findings}</ul>
			<ul class="actions">{actions}</ul>
			<ul class="sources">{sources}</ul>
			{debug}
		</section>
	}
}
