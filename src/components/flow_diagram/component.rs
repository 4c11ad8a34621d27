use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, info};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, Window};

use super::loader::{fallback_graph, flow_file};
use super::render;
use super::state::{FlowDiagramState, StatusFeed};
use super::transactions::{SYSTEM_CODE_TO_AIT, SearchPhase, TransactionStatus};
use crate::config::DiagramConfig;
use crate::data::{DataClient, Source};

/// What the surrounding page shows about the diagram.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagramSnapshot {
	pub selected: Option<String>,
	pub connected: Vec<String>,
	pub status_text: String,
	pub search_text: String,
	pub status_loading: bool,
}

impl DiagramSnapshot {
	fn of(state: &FlowDiagramState) -> Self {
		let status_text = match &state.status {
			StatusFeed::Loading => "Loading system status...".to_string(),
			StatusFeed::Ready(map) => format!("Status for {} systems", map.len()),
			StatusFeed::Failed(err) => format!("Status unavailable: {}", err),
		};
		let search_text = match state.search.phase() {
			SearchPhase::Idle => String::new(),
			SearchPhase::Invalid(msg) => msg.clone(),
			SearchPhase::Loading(id) => format!("Searching {}...", id.as_str()),
			SearchPhase::NotFound(id) => format!("No transaction {}", id.as_str()),
			SearchPhase::Failed { id, message } => {
				format!("Search for {} failed: {}", id.as_str(), message)
			}
			SearchPhase::Found(outcome) => {
				let s = &outcome.summary;
				let status = match s.status {
					TransactionStatus::Approved => "Approved",
					TransactionStatus::Rejected => "Rejected",
					TransactionStatus::Pending => "Pending",
				};
				format!(
					"{} {} {:.2} {} via {} ({} systems)",
					s.reference,
					status,
					s.amount,
					s.currency,
					s.source,
					state.search.matched().len()
				)
			}
		};
		Self {
			selected: state.selected_title(),
			connected: state.connected_names(),
			status_text,
			search_text,
			status_loading: state.status.is_loading(),
		}
	}
}

fn publish(state: &Rc<RefCell<FlowDiagramState>>, snapshot: RwSignal<DiagramSnapshot>) {
	snapshot.set(DiagramSnapshot::of(&state.borrow()));
}

fn viewport(canvas: &HtmlCanvasElement, fullscreen: bool) -> (f64, f64) {
	if fullscreen {
		if let Some(win) = web_sys::window() {
			let (w, h) = (win.inner_width(), win.inner_height());
			if let (Some(w), Some(h)) = (
				w.ok().and_then(|v| v.as_f64()),
				h.ok().and_then(|v| v.as_f64()),
			) {
				return (w, h);
			}
		}
	}
	canvas
		.parent_element()
		.map(|p| (p.client_width() as f64, p.client_height() as f64))
		.unwrap_or((800.0, 600.0))
}

#[component]
pub fn FlowDiagramCanvas(
	/// Flow id from the catalogue.
	#[prop(into)]
	flow: Signal<String>,
	/// Active transaction search, `None` when cleared.
	#[prop(into)]
	search: Signal<Option<String>>,
	/// Bumped to refetch the metrics feed.
	#[prop(into)]
	refresh: Signal<u32>,
	/// Bumped to drop the current focus.
	#[prop(into)]
	clear_focus: Signal<u32>,
	snapshot: RwSignal<DiagramSnapshot>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(optional)] config: Option<DiagramConfig>,
) -> impl IntoView {
	let config = config.unwrap_or_default().sanitized();
	let client = Rc::new(DataClient::new(Source::from(&config.source), config.clone()));
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state = Rc::new(RefCell::new(FlowDiagramState::new(
		fallback_graph(),
		&config,
		0.0,
		0.0,
	)));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));

	let (state_init, animate_init, resize_cb_init) =
		(state.clone(), animate.clone(), resize_cb.clone());
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window): Option<Window> = web_sys::window() else {
			return;
		};
		let (w, h) = viewport(&canvas, fullscreen);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);
		state_init.borrow_mut().resize(w, h);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			return;
		};

		let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
		*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
			let (nw, nh) = viewport(&canvas_resize, fullscreen);
			canvas_resize.set_width(nw as u32);
			canvas_resize.set_height(nh as u32);
			state_resize.borrow_mut().resize(nw, nh);
		}));
		if let Some(ref cb) = *resize_cb_init.borrow() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (state_anim, animate_inner) = (state_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			{
				let mut s = state_anim.borrow_mut();
				s.tick(0.016);
				render::render(&s, &ctx);
			}
			if let (Some(cb), Some(win)) = (&*animate_inner.borrow(), web_sys::window()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
		info!("Flow canvas mounted at {}x{}", w, h);
	});

	let (state_flow, client_flow) = (state.clone(), client.clone());
	Effect::new(move |_| {
		let file = flow_file(&flow.get());
		let (state, client) = (state_flow.clone(), client_flow.clone());
		spawn_local(async move {
			let graph = client.flow_graph(file).await;
			if flow_file(&flow.get_untracked()) != file {
				debug!("Discarding superseded dataset {}", file);
				return;
			}
			state.borrow_mut().replace_graph(graph);
			publish(&state, snapshot);
		});
	});

	let (state_status, client_status) = (state.clone(), client.clone());
	Effect::new(move |prev: Option<()>| {
		let generation = refresh.get();
		if prev.is_some() {
			client_status.invalidate_status();
		}
		state_status.borrow_mut().status = StatusFeed::Loading;
		publish(&state_status, snapshot);
		let (state, client) = (state_status.clone(), client_status.clone());
		spawn_local(async move {
			let result = client.status().await;
			if refresh.get_untracked() != generation {
				return;
			}
			state.borrow_mut().status = match result {
				Ok(map) => StatusFeed::Ready(map),
				Err(err) => StatusFeed::Failed(err.to_string()),
			};
			publish(&state, snapshot);
		});
	});

	let (state_search, client_search) = (state.clone(), client.clone());
	Effect::new(move |_| {
		let query = search.get();
		let ticket = {
			let mut s = state_search.borrow_mut();
			match query {
				Some(q) => s.search.begin(&q),
				None => {
					s.search.clear();
					s.clear_focus();
					None
				}
			}
		};
		publish(&state_search, snapshot);
		let Some(ticket) = ticket else {
			return;
		};
		let (state, client) = (state_search.clone(), client_search.clone());
		spawn_local(async move {
			let result = client.search_transaction(ticket.id()).await;
			let landed = state
				.borrow_mut()
				.search
				.complete(&ticket, result, SYSTEM_CODE_TO_AIT);
			if landed {
				publish(&state, snapshot);
			} else {
				debug!("Discarding stale search for {}", ticket.id().as_str());
			}
		});
	});

	let state_unfocus = state.clone();
	Effect::new(move |prev: Option<()>| {
		clear_focus.track();
		if prev.is_some() {
			state_unfocus.borrow_mut().clear_focus();
			publish(&state_unfocus, snapshot);
		}
	});

	let state_click = state.clone();
	let on_click = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let rect = canvas.get_bounding_client_rect();
		let (x, y) = (
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		);
		if state_click.borrow_mut().handle_click(x, y) {
			publish(&state_click, snapshot);
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="flow-diagram-canvas"
			on:click=on_click
			style="display: block; cursor: pointer;"
		/>
	}
}
