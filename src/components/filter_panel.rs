use std::collections::BTreeMap;

use leptos::prelude::*;

use crate::engine::filter::FilterState;

/// Filter controls bound to a [`FilterState`] signal. Every control edits the
/// signal in place; the page derives the visible graph from it.
#[component]
pub fn FilterPanel(
	filter: RwSignal<FilterState>,
	/// Node count per entity type.
	type_counts: BTreeMap<String, usize>,
	relations: Vec<String>,
	max_degree: usize,
	isolate_count: usize,
	#[prop(into)] on_reset: Callback<()>,
) -> impl IntoView {
	let type_boxes = type_counts
		.into_iter()
		.map(|(node_type, count)| {
			let checked = {
				let node_type = node_type.clone();
				move || filter.with(|f| f.selected_types.contains(&node_type))
			};
			let toggle = {
				let node_type = node_type.clone();
				move |_| filter.update(|f| f.toggle_type(&node_type))
			};
			view! {
				<label class="filter-option">
					<input type="checkbox" prop:checked=checked on:change=toggle />
					{format!("{node_type} ({count})")}
				</label>
			}
		})
		.collect_view();

	let relation_boxes = relations
		.into_iter()
		.map(|relation| {
			let checked = {
				let relation = relation.clone();
				move || filter.with(|f| f.selected_relations.contains(&relation))
			};
			let toggle = {
				let relation = relation.clone();
				move |_| filter.update(|f| f.toggle_relation(&relation))
			};
			view! {
				<label class="filter-option">
					<input type="checkbox" prop:checked=checked on:change=toggle />
					{relation}
				</label>
			}
		})
		.collect_view();

	let parse_degree = |raw: String| raw.trim().parse::<usize>().ok();

	view! {
		<aside class="filter-panel">
			<input
				type="search"
				placeholder="Search labels"
				prop:value=move || filter.with(|f| f.search_term.clone())
				on:input=move |ev| {
					let term = event_target_value(&ev);
					filter.update(|f| f.search_term = term);
				}
			/>

			<fieldset>
				<legend>"Types"</legend>
				{type_boxes}
			</fieldset>

			<fieldset>
				<legend>"Relations"</legend>
				{relation_boxes}
			</fieldset>

			<fieldset>
				<legend>{format!("Degree (max {max_degree})")}</legend>
				<input
					type="number"
					min="0"
					prop:value=move || filter.with(|f| f.min_degree.to_string())
					on:change=move |ev| {
						let min = parse_degree(event_target_value(&ev)).unwrap_or(0);
						filter.update(|f| f.min_degree = min);
					}
				/>
				<input
					type="number"
					min="0"
					prop:value=move || {
						filter.with(|f| f.max_degree.map(|m| m.to_string()).unwrap_or_default())
					}
					on:change=move |ev| {
						let max = parse_degree(event_target_value(&ev));
						filter.update(|f| f.max_degree = max);
					}
				/>
			</fieldset>

			<label class="filter-option">
				<input
					type="checkbox"
					prop:checked=move || filter.with(|f| f.show_isolates)
					on:change=move |ev| {
						let show = event_target_checked(&ev);
						filter.update(|f| f.show_isolates = show);
					}
				/>
				{format!("Show isolated nodes ({isolate_count})")}
			</label>

			<button on:click=move |_| on_reset.run(())>"Reset filters"</button>
		</aside>
	}
}
