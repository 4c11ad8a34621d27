use leptos::prelude::*;

use crate::components::flow_diagram::{DiagramSnapshot, FLOW_OPTIONS, FlowDiagramCanvas};

/// Flow monitor: topology picker, transaction search and the diagram.
#[component]
pub fn Home() -> impl IntoView {
	let flow = RwSignal::new(FLOW_OPTIONS[0].id.to_string());
	let query = RwSignal::new(String::new());
	let search = RwSignal::new(None::<String>);
	let refresh = RwSignal::new(0u32);
	let unfocus = RwSignal::new(0u32);
	let snapshot = RwSignal::new(DiagramSnapshot::default());

	let flow_name = move || {
		let id = flow.get();
		FLOW_OPTIONS
			.iter()
			.find(|o| o.id == id)
			.map(|o| o.name)
			.unwrap_or(FLOW_OPTIONS[0].name)
	};

	let on_search = move |ev: leptos::ev::SubmitEvent| {
		ev.prevent_default();
		search.set(Some(query.get_untracked()));
	};
	let on_clear = move |_| {
		query.set(String::new());
		search.set(None);
	};

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
		}>

			<div class="flow-monitor">
				<header class="flow-toolbar">
					<select on:change=move |ev| flow.set(event_target_value(&ev))>
						{FLOW_OPTIONS
							.iter()
							.map(|o| {
								view! {
									<option value=o.id selected=move || flow.get() == o.id>
										{o.name}
									</option>
								}
							})
							.collect_view()}
					</select>
					<span class="flow-current">{flow_name}</span>

					<form class="flow-search" on:submit=on_search>
						<input
							type="text"
							placeholder="Transaction ID"
							maxlength="16"
							prop:value=move || query.get()
							on:input=move |ev| query.set(event_target_value(&ev))
						/>
						<button type="submit">"Search"</button>
						<button type="button" on:click=on_clear>"Clear"</button>
					</form>

					<button
						type="button"
						disabled=move || snapshot.with(|s| s.status_loading)
						on:click=move |_| refresh.update(|n| *n += 1)
					>
						"Refresh status"
					</button>
					<span class="flow-status">{move || snapshot.with(|s| s.status_text.clone())}</span>
				</header>

				<p class="flow-search-result">{move || snapshot.with(|s| s.search_text.clone())}</p>

				<div class="flow-canvas">
					<FlowDiagramCanvas
						flow=flow
						search=search
						refresh=refresh
						clear_focus=unfocus
						snapshot=snapshot
					/>
				</div>

				<Show when=move || snapshot.with(|s| s.selected.is_some())>
					<aside class="flow-connections">
						<h2>{move || snapshot.with(|s| s.selected.clone().unwrap_or_default())}</h2>
						<p>"Connected systems"</p>
						<ul>
							{move || {
								snapshot
									.with(|s| s.connected.clone())
									.into_iter()
									.map(|name| view! { <li>{name}</li> })
									.collect_view()
							}}
						</ul>
						<button type="button" on:click=move |_| unfocus.update(|n| *n += 1)>
							"Clear selection"
						</button>
					</aside>
				</Show>
			</div>
		</ErrorBoundary>
	}
}
