use std::collections::HashSet;

use log::debug;

use super::layout::LayoutTemplate;
use super::status::{NodeStatus, StatusMap, external_id};
use super::transactions::{NodeAffordance, SearchSession, affordance};
use super::types::{FlowGraph, GraphEdge, GraphNode, Size};
use crate::config::DiagramConfig;

/// Rendered card size of a regular node.
pub const NODE_WIDTH: f64 = 150.0;
pub const NODE_HEIGHT: f64 = 88.0;

/// How an element should be drawn given the current focus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisualState {
	/// No focus is active.
	Normal,
	Selected,
	Connected,
	Dimmed,
}

/// Focused node and its induced neighbourhood.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InteractionState {
	pub selected: Option<String>,
	pub connected_nodes: HashSet<String>,
	pub connected_edges: HashSet<String>,
}

impl InteractionState {
	/// Focus `node_id`, or clear the focus if it is already focused.
	pub fn toggle_focus(&mut self, node_id: &str, edges: &[GraphEdge]) -> &Self {
		if self.selected.as_deref() == Some(node_id) {
			self.clear();
			return self;
		}

		self.connected_nodes.clear();
		self.connected_edges.clear();
		for edge in edges {
			if edge.source == node_id {
				self.connected_edges.insert(edge.id.clone());
				self.connected_nodes.insert(edge.target.clone());
			}
			if edge.target == node_id {
				self.connected_edges.insert(edge.id.clone());
				self.connected_nodes.insert(edge.source.clone());
			}
		}
		self.selected = Some(node_id.to_string());
		self
	}

	pub fn clear(&mut self) {
		self.selected = None;
		self.connected_nodes.clear();
		self.connected_edges.clear();
	}

	pub fn has_focus(&self) -> bool {
		self.selected.is_some()
	}

	pub fn node_visual(&self, id: &str) -> VisualState {
		match &self.selected {
			None => VisualState::Normal,
			Some(s) if s == id => VisualState::Selected,
			Some(_) if self.connected_nodes.contains(id) => VisualState::Connected,
			Some(_) => VisualState::Dimmed,
		}
	}

	pub fn edge_visual(&self, id: &str) -> VisualState {
		match &self.selected {
			None => VisualState::Normal,
			Some(_) if self.connected_edges.contains(id) => VisualState::Connected,
			Some(_) => VisualState::Dimmed,
		}
	}
}

/// Metrics feed as seen by the diagram.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum StatusFeed {
	#[default]
	Loading,
	Ready(StatusMap),
	Failed(String),
}

impl StatusFeed {
	pub fn is_loading(&self) -> bool {
		matches!(self, StatusFeed::Loading)
	}
}

pub struct FlowDiagramState {
	template: LayoutTemplate,
	pub graph: FlowGraph,
	pub interaction: InteractionState,
	pub status: StatusFeed,
	pub search: SearchSession,
	pub width: f64,
	pub height: f64,
	/// Seconds of animation, drives the dash offset on highlighted edges.
	pub flow_time: f64,
	proportions: [f64; 4],
	gap: f64,
}

impl FlowDiagramState {
	pub fn new(template: FlowGraph, config: &DiagramConfig, width: f64, height: f64) -> Self {
		let template = LayoutTemplate::capture(template);
		let graph = template.graph().clone();
		let mut state = Self {
			template,
			graph,
			interaction: InteractionState::default(),
			status: StatusFeed::default(),
			search: SearchSession::default(),
			width: 0.0,
			height: 0.0,
			flow_time: 0.0,
			proportions: config.section_proportions,
			gap: config.section_gap,
		};
		state.resize(width, height);
		state
	}

	/// Swap in a freshly loaded dataset; the focus does not survive.
	pub fn replace_graph(&mut self, template: FlowGraph) {
		self.template = LayoutTemplate::capture(template);
		self.interaction.clear();
		self.relayout();
	}

	/// Re-fit the sections to a new viewport. Degenerate sizes are ignored.
	pub fn resize(&mut self, width: f64, height: f64) {
		if width <= 0.0 || height <= 0.0 {
			debug!("Ignoring degenerate viewport {}x{}", width, height);
			return;
		}
		self.width = width;
		self.height = height;
		self.relayout();
	}

	fn relayout(&mut self) {
		if self.width <= 0.0 || self.height <= 0.0 {
			self.graph = self.template.graph().clone();
			return;
		}
		self.graph = self.template.layout(
			Size::new(self.width, self.height),
			&self.proportions,
			self.gap,
		);
	}

	pub fn tick(&mut self, dt: f64) {
		if self.interaction.has_focus() {
			self.flow_time += dt;
		}
	}

	/// Click on a node. Disabled while the status feed is still loading,
	/// and only regular nodes can take focus.
	pub fn toggle_focus(&mut self, node_id: &str) -> &InteractionState {
		let focusable = self.graph.node(node_id).is_some_and(GraphNode::is_regular);
		if focusable && !self.status.is_loading() {
			self.interaction.toggle_focus(node_id, &self.graph.edges);
		}
		&self.interaction
	}

	pub fn clear_focus(&mut self) {
		self.interaction.clear();
	}

	/// Regular node under the canvas point, topmost first.
	pub fn node_at_position(&self, x: f64, y: f64) -> Option<&GraphNode> {
		self.graph
			.regular_nodes()
			.map(|(n, _)| n)
			.filter(|n| {
				x >= n.position.x
					&& x <= n.position.x + NODE_WIDTH
					&& y >= n.position.y
					&& y <= n.position.y + NODE_HEIGHT
			})
			.last()
	}

	pub fn handle_click(&mut self, x: f64, y: f64) -> bool {
		let Some(id) = self.node_at_position(x, y).map(|n| n.id.clone()) else {
			return false;
		};
		self.toggle_focus(&id);
		true
	}

	pub fn node_status(&self, subtitle: &str) -> NodeStatus {
		match &self.status {
			StatusFeed::Ready(map) => map.for_subtitle(subtitle),
			_ => NodeStatus::default(),
		}
	}

	pub fn node_affordance(&self, subtitle: &str) -> NodeAffordance {
		let matched = external_id(subtitle).is_some_and(|id| self.search.is_matched(id));
		affordance(self.search.mode(), matched)
	}

	/// Display names of the focused node's neighbours, sorted.
	pub fn connected_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self
			.interaction
			.connected_nodes
			.iter()
			.map(|id| {
				self.graph
					.node(id)
					.map(|n| n.title().to_string())
					.unwrap_or_else(|| id.clone())
			})
			.collect();
		names.sort();
		names
	}

	pub fn selected_title(&self) -> Option<String> {
		let id = self.interaction.selected.as_deref()?;
		self.graph.node(id).map(|n| n.title().to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::flow_diagram::loader::{parse_dataset, transform};
	use crate::components::flow_diagram::status::{StatusColor, parse_metric_rows, resolve};
	use crate::components::flow_diagram::transactions::{
		OverlayMode, SYSTEM_CODE_TO_AIT, TransactionRecord, search_records,
	};

	fn graph(json: &str) -> FlowGraph {
		transform(parse_dataset(json).unwrap())
	}

	fn sample() -> FlowGraph {
		graph(
			r#"{
				"nodes": [
					{"id": "A", "data": {"label": "Alpha"}, "class": "origination"},
					{"id": "B", "data": {"label": "Beta"}, "class": "payment validation and routing"},
					{"id": "C", "data": {"label": "Gamma"}, "class": "middleware"},
					{"id": "D", "data": {"label": "Delta"}, "class": "clearing / settlement"}
				],
				"edges": [
					{"id": "A-B", "source": "A", "target": "B"},
					{"id": "fan", "source": "B", "target": ["C", "D"]}
				]
			}"#,
		)
	}

	fn ready(graph: FlowGraph) -> FlowDiagramState {
		let mut state = FlowDiagramState::new(graph, &DiagramConfig::default(), 1650.0, 960.0);
		state.status = StatusFeed::Ready(StatusMap::default());
		state
	}

	#[test]
	fn clicking_a_yields_its_neighbourhood() {
		let mut state = ready(sample());
		let interaction = state.toggle_focus("A");
		assert_eq!(interaction.selected.as_deref(), Some("A"));
		assert_eq!(interaction.connected_nodes, HashSet::from(["B".to_string()]));
		assert_eq!(interaction.connected_edges, HashSet::from(["A-B".to_string()]));
	}

	#[test]
	fn neighbourhood_only_names_nodes_in_the_graph() {
		let mut state = ready(graph(
			r#"{
				"nodes": [
					{"id": "A", "data": {"label": "Alpha"}, "class": "origination"},
					{"id": "B", "data": {"label": "Beta"}, "class": "middleware"},
					{"id": "Z", "data": {"label": "Legacy"}, "class": "mainframe"}
				],
				"edges": [
					{"id": "A-B", "source": "A", "target": "B"},
					{"id": "A-Z", "source": "A", "target": "Z"}
				]
			}"#,
		));
		state.toggle_focus("A");
		assert_eq!(
			state.interaction.connected_nodes,
			HashSet::from(["B".to_string()])
		);
		assert_eq!(state.connected_names(), ["Beta"]);
	}

	#[test]
	fn clicking_twice_restores_unfocused() {
		let mut state = ready(sample());
		state.toggle_focus("B");
		state.toggle_focus("B");
		assert_eq!(state.interaction, InteractionState::default());
		for node in &state.graph.nodes {
			assert_eq!(state.interaction.node_visual(&node.id), VisualState::Normal);
		}
	}

	#[test]
	fn switching_focus_replaces_neighbourhood() {
		let mut state = ready(sample());
		state.toggle_focus("A");
		let interaction = state.toggle_focus("B");
		assert_eq!(interaction.selected.as_deref(), Some("B"));
		assert_eq!(
			interaction.connected_nodes,
			HashSet::from(["A".to_string(), "C".to_string(), "D".to_string()])
		);
		assert_eq!(
			interaction.connected_edges,
			HashSet::from(["A-B".to_string(), "B-C".to_string(), "B-D".to_string()])
		);
	}

	#[test]
	fn neighbourhood_is_symmetric() {
		let mut state = ready(sample());
		for node in state.graph.regular_nodes().map(|(n, _)| n.id.clone()).collect::<Vec<_>>() {
			let neighbours = state.toggle_focus(&node).connected_nodes.clone();
			for other in neighbours {
				state.clear_focus();
				assert!(state.toggle_focus(&other).connected_nodes.contains(&node));
				state.clear_focus();
			}
			state.clear_focus();
		}
	}

	#[test]
	fn visual_classification() {
		let mut state = ready(sample());
		state.toggle_focus("A");
		let i = &state.interaction;
		assert_eq!(i.node_visual("A"), VisualState::Selected);
		assert_eq!(i.node_visual("B"), VisualState::Connected);
		assert_eq!(i.node_visual("C"), VisualState::Dimmed);
		assert_eq!(i.edge_visual("A-B"), VisualState::Connected);
		assert_eq!(i.edge_visual("B-C"), VisualState::Dimmed);
	}

	#[test]
	fn focus_is_disabled_while_status_loads() {
		let mut state = FlowDiagramState::new(sample(), &DiagramConfig::default(), 1650.0, 960.0);
		assert!(state.status.is_loading());
		assert!(!state.toggle_focus("A").has_focus());
		state.status = StatusFeed::Failed("offline".into());
		assert!(state.toggle_focus("A").has_focus());
	}

	#[test]
	fn backgrounds_cannot_take_focus() {
		let mut state = ready(sample());
		assert!(!state.toggle_focus("bg-middleware").has_focus());
		assert!(!state.toggle_focus("missing").has_focus());
	}

	#[test]
	fn click_hits_node_cards() {
		let mut state = ready(sample());
		let a = state.graph.node("A").unwrap().position;
		assert!(state.handle_click(a.x + 10.0, a.y + 10.0));
		assert_eq!(state.interaction.selected.as_deref(), Some("A"));
		assert!(!state.handle_click(-50.0, -50.0));
		assert_eq!(state.interaction.selected.as_deref(), Some("A"));
	}

	#[test]
	fn connected_names_are_sorted_titles() {
		let mut state = ready(sample());
		state.toggle_focus("B");
		assert_eq!(state.connected_names(), ["Alpha", "Delta", "Gamma"]);
		assert_eq!(state.selected_title().as_deref(), Some("Beta"));
	}

	#[test]
	fn resize_ignores_degenerate_viewports() {
		let mut state = ready(sample());
		let before = state.graph.clone();
		state.resize(0.0, 700.0);
		assert_eq!(state.graph, before);
		state.resize(800.0, 600.0);
		assert_ne!(state.graph, before);
		assert_eq!(state.width, 800.0);
	}

	#[test]
	fn replacing_the_graph_clears_focus() {
		let mut state = ready(sample());
		state.toggle_focus("A");
		state.replace_graph(sample());
		assert!(!state.interaction.has_focus());
	}

	#[test]
	fn overlays_compose_per_node() {
		let mut state = ready(graph(
			r#"{"nodes": [
				{"id": "28960", "data": {"label": "CashPro Payments"}, "class": "middleware"},
				{"id": "512", "data": {"label": "Swift Alliance"}, "class": "clearing / settlement"}
			]}"#,
		));
		let rows =
			parse_metric_rows(r#"[{"aiT_NUM": "28960", "is_TRAFFIC_FOLLOWING": "Yes"}]"#).unwrap();
		state.status = StatusFeed::Ready(resolve(&rows, 2.0));
		assert_eq!(state.node_status("AIT 28960").traffic, StatusColor::Green);
		assert_eq!(state.node_status("AIT 512"), NodeStatus::default());
		assert_eq!(state.node_affordance("AIT 512"), NodeAffordance::StatusControls);

		let ticket = state.search.begin("T0P7R96NFJWBBSTZ").unwrap();
		assert_eq!(state.node_affordance("AIT 512"), NodeAffordance::Busy);
		let mut record = TransactionRecord::default();
		record.raw.SMH_SOURCE = Some("GPP".into());
		record.raw.RUA_20BYTE_STRING_001 = Some("T0P7R96NFJWBBSTZ".into());
		let outcome = search_records(&[record], ticket.id());
		state.search.complete(&ticket, outcome, SYSTEM_CODE_TO_AIT);
		assert_eq!(state.search.mode(), OverlayMode::Results);
		assert_eq!(state.node_affordance("AIT 28960"), NodeAffordance::Actions);
		assert_eq!(state.node_affordance("AIT 512"), NodeAffordance::Hidden);
	}
}
