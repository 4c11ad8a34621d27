use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::{FlowDiagramState, NODE_HEIGHT, NODE_WIDTH, StatusFeed, VisualState};
use super::status::NodeStatus;
use super::transactions::NodeAffordance;
use super::types::{GraphEdge, GraphNode, NodeKind, Point};

const CANVAS_BG: &str = "#eeeff3";
const SECTION_FILL: &str = "rgba(226, 232, 240, 0.6)";
const SECTION_TITLE: &str = "#334155";
const ACCENT: &str = "#1d4ed8";
const DIMMED_EDGE: &str = "#d1d5db";
const ARROW_SIZE: f64 = 8.0;
const PILL_HEIGHT: f64 = 18.0;

pub fn render(state: &FlowDiagramState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(CANVAS_BG);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	draw_containers(state, ctx);
	draw_edges(state, ctx);
	draw_nodes(state, ctx);
}

fn node_center(node: &GraphNode) -> Point {
	Point::new(
		node.position.x + NODE_WIDTH / 2.0,
		node.position.y + NODE_HEIGHT / 2.0,
	)
}

fn draw_containers(state: &FlowDiagramState, ctx: &CanvasRenderingContext2d) {
	for node in &state.graph.nodes {
		let Some(size) = node.size() else {
			continue;
		};
		let (x, y) = (node.position.x, node.position.y);
		ctx.set_fill_style_str(SECTION_FILL);
		ctx.fill_rect(x, y, size.width, size.height);
		if let NodeKind::Group { .. } = node.kind {
			ctx.set_stroke_style_str("#94a3b8");
			ctx.set_line_width(1.0);
			ctx.stroke_rect(x, y, size.width, size.height);
		}
		ctx.set_fill_style_str(SECTION_TITLE);
		ctx.set_font("600 13px sans-serif");
		ctx.set_text_align("center");
		let _ = ctx.fill_text(node.title(), x + size.width / 2.0, y + 24.0);
	}
}

fn draw_arrow(ctx: &CanvasRenderingContext2d, tip: Point, ux: f64, uy: f64) {
	let (back_x, back_y) = (tip.x - ux * ARROW_SIZE, tip.y - uy * ARROW_SIZE);
	let (px, py) = (-uy * ARROW_SIZE * 0.5, ux * ARROW_SIZE * 0.5);
	ctx.begin_path();
	ctx.move_to(tip.x, tip.y);
	ctx.line_to(back_x + px, back_y + py);
	ctx.line_to(back_x - px, back_y - py);
	ctx.close_path();
	ctx.fill();
}

fn draw_edge(state: &FlowDiagramState, ctx: &CanvasRenderingContext2d, edge: &GraphEdge) {
	let (Some(src), Some(tgt)) = (state.graph.node(&edge.source), state.graph.node(&edge.target))
	else {
		return;
	};
	let (a, b) = (node_center(src), node_center(tgt));
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < 0.001 {
		return;
	}
	let (ux, uy) = (dx / dist, dy / dist);

	// Clip to the card boundary along the line.
	let inset = |ux: f64, uy: f64| {
		let tx = if ux.abs() > 1e-9 { (NODE_WIDTH / 2.0) / ux.abs() } else { f64::MAX };
		let ty = if uy.abs() > 1e-9 { (NODE_HEIGHT / 2.0) / uy.abs() } else { f64::MAX };
		tx.min(ty)
	};
	let d = inset(ux, uy);
	let start = Point::new(a.x + ux * d, a.y + uy * d);
	let end = Point::new(b.x - ux * d, b.y - uy * d);

	let visual = state.interaction.edge_visual(&edge.id);
	let (stroke, width, alpha) = match visual {
		VisualState::Connected => (ACCENT, edge.style.width + 1.0, 1.0),
		VisualState::Dimmed => (DIMMED_EDGE, edge.style.width, 0.3),
		VisualState::Normal | VisualState::Selected => (edge.style.stroke, edge.style.width, 1.0),
	};

	ctx.set_global_alpha(alpha);
	ctx.set_stroke_style_str(stroke);
	ctx.set_fill_style_str(stroke);
	ctx.set_line_width(width);
	if visual == VisualState::Connected {
		let (dash, gap) = (8.0, 4.0);
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(dash),
			&JsValue::from_f64(gap),
		));
		ctx.set_line_dash_offset(-(state.flow_time * 30.0) % (dash + gap));
	}

	ctx.begin_path();
	ctx.move_to(start.x + ux * ARROW_SIZE, start.y + uy * ARROW_SIZE);
	ctx.line_to(end.x - ux * ARROW_SIZE, end.y - uy * ARROW_SIZE);
	ctx.stroke();
	let _ = ctx.set_line_dash(&js_sys::Array::new());

	if edge.style.marker_end {
		draw_arrow(ctx, end, ux, uy);
	}
	if edge.style.marker_start {
		draw_arrow(ctx, start, -ux, -uy);
	}
	ctx.set_global_alpha(1.0);
}

fn draw_edges(state: &FlowDiagramState, ctx: &CanvasRenderingContext2d) {
	for edge in &state.graph.edges {
		draw_edge(state, ctx, edge);
	}
}

fn draw_pills(ctx: &CanvasRenderingContext2d, x: f64, y: f64, pills: &[(&str, &str)]) {
	let width = (NODE_WIDTH - 16.0 - 4.0 * (pills.len() as f64 - 1.0)) / pills.len() as f64;
	ctx.set_font("500 10px sans-serif");
	ctx.set_text_align("center");
	for (i, (label, fill)) in pills.iter().enumerate() {
		let px = x + 8.0 + i as f64 * (width + 4.0);
		ctx.set_fill_style_str(fill);
		ctx.fill_rect(px, y, width, PILL_HEIGHT);
		ctx.set_fill_style_str(if *fill == "#f1f5f9" { "#334155" } else { "white" });
		let _ = ctx.fill_text(label, px + width / 2.0, y + 12.5);
	}
}

fn draw_affordance(
	ctx: &CanvasRenderingContext2d,
	node: &GraphNode,
	affordance: NodeAffordance,
	status: NodeStatus,
	feed_failed: bool,
) {
	let (x, y) = (node.position.x, node.position.y + NODE_HEIGHT - PILL_HEIGHT - 10.0);
	let (traffic, trend) = if feed_failed {
		("#94a3b8", "#94a3b8")
	} else {
		(status.traffic.fill(), status.trend.fill())
	};
	match affordance {
		NodeAffordance::StatusControls => draw_pills(
			ctx,
			x,
			y,
			&[("Flow", traffic), ("Trend", trend), ("Balanced", "#f1f5f9")],
		),
		NodeAffordance::Busy => draw_pills(ctx, x, y, &[("...", "#475569"), ("...", "#475569")]),
		NodeAffordance::Actions => {
			draw_pills(ctx, x, y, &[("Summary", "#475569"), ("Details", "#475569")])
		}
		NodeAffordance::Hidden => {}
	}
}

fn draw_nodes(state: &FlowDiagramState, ctx: &CanvasRenderingContext2d) {
	let loading = state.status.is_loading();
	let failed = matches!(state.status, StatusFeed::Failed(_));

	for (node, regular) in state.graph.regular_nodes() {
		let (x, y) = (node.position.x, node.position.y);
		let visual = state.interaction.node_visual(&node.id);

		if loading {
			ctx.set_fill_style_str("#e2e8f0");
			ctx.fill_rect(x, y, NODE_WIDTH, NODE_HEIGHT);
			continue;
		}

		ctx.set_global_alpha(if visual == VisualState::Dimmed { 0.4 } else { 1.0 });
		ctx.set_fill_style_str(if failed { "#fef2f2" } else { "white" });
		ctx.fill_rect(x, y, NODE_WIDTH, NODE_HEIGHT);

		let (ring, ring_width) = match visual {
			VisualState::Selected => ("#475569", 4.0),
			VisualState::Connected => ("#94a3b8", 3.0),
			VisualState::Normal | VisualState::Dimmed => ("#cbd5e1", 2.0),
		};
		ctx.set_stroke_style_str(ring);
		ctx.set_line_width(ring_width);
		ctx.stroke_rect(x, y, NODE_WIDTH, NODE_HEIGHT);

		ctx.set_text_align("center");
		ctx.set_fill_style_str("#0f172a");
		ctx.set_font("700 12px sans-serif");
		let _ = ctx.fill_text(&regular.display_name, x + NODE_WIDTH / 2.0, y + 22.0);
		ctx.set_fill_style_str("#475569");
		ctx.set_font("500 10px sans-serif");
		let _ = ctx.fill_text(&regular.subtitle, x + NODE_WIDTH / 2.0, y + 38.0);

		draw_affordance(
			ctx,
			node,
			state.node_affordance(&regular.subtitle),
			state.node_status(&regular.subtitle),
			failed,
		);
		ctx.set_global_alpha(1.0);
	}
}
