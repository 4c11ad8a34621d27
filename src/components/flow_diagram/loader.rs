//! Turns a raw topology document into a template [`FlowGraph`].

use std::collections::HashSet;

use log::{debug, error, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::layout::{SlotAllocator, TEMPLATE_HEIGHT, template_backgrounds};
use super::types::{
	DEFAULT_EDGE_KIND, EdgeStyle, EdgeTarget, FlowGraph, GraphEdge, GraphNode, NodeKind, Placement,
	Point, RawDataset, RawEdge, RawNode, RegularNode, Section, Size,
};
use crate::config::RetryPolicy;
use crate::data::error::FetchError;
use crate::data::source::{DataSource, fetch_with_retry};

const BACKGROUND_TYPE: &str = "background";
const GROUP_SIZE: Size = Size::new(350.0, TEMPLATE_HEIGHT);

/// The four empty section columns, returned whenever loading fails.
pub fn fallback_graph() -> FlowGraph {
	FlowGraph {
		nodes: template_backgrounds(),
		edges: Vec::new(),
	}
}

/// Top level of a topology document, elements still undecoded.
#[derive(Deserialize)]
struct RawDocument {
	#[serde(default)]
	nodes: Vec<Value>,
	#[serde(default)]
	edges: Vec<Value>,
}

/// Decode a topology document. Only a document that is not an object of
/// `nodes`/`edges` arrays fails; bad elements are logged and skipped.
pub fn parse_dataset(text: &str) -> Result<RawDataset, FetchError> {
	let doc: RawDocument = serde_json::from_str(text)?;
	Ok(RawDataset {
		nodes: decode_each(doc.nodes, "node"),
		edges: decode_each(doc.edges, "edge"),
	})
}

fn decode_each<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
	values
		.into_iter()
		.enumerate()
		.filter_map(|(i, value)| match serde_json::from_value(value) {
			Ok(item) => Some(item),
			Err(err) => {
				warn!("Skipping malformed {} #{}: {}", what, i, err);
				None
			}
		})
		.collect()
}

/// A selectable topology and the document it is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowOption {
	pub id: &'static str,
	pub name: &'static str,
	pub description: &'static str,
	pub file: &'static str,
}

pub const FLOW_OPTIONS: &[FlowOption] = &[
	FlowOption {
		id: "us-wires",
		name: "US Wires",
		description: "Domestic and cross-border wire payments",
		file: "us-wires.json",
	},
	FlowOption {
		id: "korea",
		name: "Korea",
		description: "Korea payment corridor",
		file: "korea.json",
	},
];

/// Document for a flow id, defaulting to the first flow.
pub fn flow_file(id: &str) -> &'static str {
	FLOW_OPTIONS
		.iter()
		.find(|o| o.id == id)
		.unwrap_or(&FLOW_OPTIONS[0])
		.file
}

/// Fetch and transform `file`, surfacing the failure.
pub async fn try_load<S: DataSource>(
	source: &S,
	file: &str,
	retry: &RetryPolicy,
) -> Result<FlowGraph, FetchError> {
	let text = fetch_with_retry(source, file, retry).await?;
	Ok(transform(parse_dataset(&text)?))
}

/// Fetch and transform `file`. Never fails: errors are logged and the
/// fallback graph is returned instead.
pub async fn load<S: DataSource>(source: &S, file: &str, retry: &RetryPolicy) -> FlowGraph {
	try_load(source, file, retry).await.unwrap_or_else(|err| {
		error!("Failed to load flow data from {}: {}", file, err);
		fallback_graph()
	})
}

pub fn transform(raw: RawDataset) -> FlowGraph {
	let mut nodes = template_backgrounds();
	let mut seen: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();

	// Containers first so explicit parents can be resolved regardless of order.
	let containers: HashSet<&str> = raw
		.nodes
		.iter()
		.filter(|n| is_background(n))
		.map(|n| n.id.as_str())
		.chain(Section::ALL.map(Section::background_id))
		.collect();

	let mut slots = SlotAllocator::default();
	for node in &raw.nodes {
		if seen.contains(&node.id) {
			if is_background(node) && Section::from_background_id(&node.id).is_some() {
				debug!("Section background {} is built in, skipping", node.id);
			} else {
				warn!("Duplicate node id {}, keeping the first", node.id);
			}
			continue;
		}
		let Some(converted) = convert_node(node, &containers, &nodes, &mut slots) else {
			continue;
		};
		seen.insert(converted.id.clone());
		nodes.push(converted);
	}

	let edges = expand_edges(&raw.edges)
		.into_iter()
		.filter(|edge| {
			let known = seen.contains(&edge.source) && seen.contains(&edge.target);
			if !known {
				warn!(
					"Edge {} joins {} and {}, which are not both in the graph; dropping",
					edge.id, edge.source, edge.target
				);
			}
			known
		})
		.collect();

	FlowGraph { nodes, edges }
}

fn is_background(node: &RawNode) -> bool {
	node.kind.as_deref() == Some(BACKGROUND_TYPE)
}

fn display_name(node: &RawNode) -> String {
	node.title
		.clone()
		.or_else(|| node.data.as_ref().and_then(|d| d.label.clone()))
		.or_else(|| node.label.clone())
		.unwrap_or_else(|| format!("Node {}", node.id))
}

fn convert_node(
	node: &RawNode,
	containers: &HashSet<&str>,
	placed: &[GraphNode],
	slots: &mut SlotAllocator,
) -> Option<GraphNode> {
	if is_background(node) {
		return Some(GraphNode {
			id: node.id.clone(),
			kind: NodeKind::Group {
				title: node.label.clone().unwrap_or_else(|| "Background".into()),
				size: GROUP_SIZE,
			},
			position: Point::default(),
		});
	}

	if let Some(parent_id) = &node.parent_id {
		if !containers.contains(parent_id.as_str()) {
			warn!("Unknown parent {} for node {}", parent_id, node.id);
			return None;
		}
		let origin = placed
			.iter()
			.find(|n| &n.id == parent_id)
			.map(|n| n.position)
			.unwrap_or_default();
		let offset = node.position.unwrap_or_default();
		return Some(GraphNode {
			id: node.id.clone(),
			kind: NodeKind::Regular(RegularNode {
				display_name: display_name(node),
				subtitle: node
					.subtext
					.clone()
					.unwrap_or_else(|| format!("AIT {}", node.id)),
				parent_id: parent_id.clone(),
				placement: Placement::Explicit,
			}),
			position: Point::new(origin.x + offset.x, origin.y + offset.y),
		});
	}

	let class = node.class.as_deref().unwrap_or_default();
	let Some(section) = Section::from_class(class) else {
		warn!("Unknown class: {} for node {}", class, node.id);
		return None;
	};
	Some(GraphNode {
		id: node.id.clone(),
		kind: NodeKind::Regular(RegularNode {
			display_name: display_name(node),
			subtitle: format!("AIT {}", node.id),
			parent_id: section.background_id().to_string(),
			placement: Placement::Section(section),
		}),
		position: slots.next(section),
	})
}

/// Expand fan-out edges into one edge per target, ids `source-target`.
///
/// Scalar edges pass through, so expanding an expanded set changes nothing.
pub fn expand_edges(raw: &[RawEdge]) -> Vec<GraphEdge> {
	let mut seen = HashSet::new();
	let mut edges = Vec::with_capacity(raw.len());
	let mut push = |id: String, source: &str, target: &str, kind: &Option<String>| {
		if !seen.insert(id.clone()) {
			warn!("Duplicate edge id {}, keeping the first", id);
			return;
		}
		edges.push(GraphEdge {
			id,
			source: source.to_string(),
			target: target.to_string(),
			kind: kind.clone().unwrap_or_else(|| DEFAULT_EDGE_KIND.to_string()),
			style: EdgeStyle::default(),
		});
	};

	for edge in raw {
		match &edge.target {
			EdgeTarget::One(target) => push(edge.id.clone(), &edge.source, target, &edge.kind),
			EdgeTarget::Many(targets) if targets.is_empty() => {
				warn!("Edge {} has an empty target list, dropping", edge.id);
			}
			EdgeTarget::Many(targets) => {
				for target in targets {
					push(
						format!("{}-{}", edge.source, target),
						&edge.source,
						target,
						&edge.kind,
					);
				}
			}
		}
	}
	edges
}
