use serde::Deserialize;

/// Coarse processing stage; one column of the diagram each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
	Origination,
	Validation,
	Middleware,
	Processing,
}

impl Section {
	/// Left-to-right order on screen.
	pub const ALL: [Section; 4] = [
		Section::Origination,
		Section::Validation,
		Section::Middleware,
		Section::Processing,
	];

	pub fn index(self) -> usize {
		self as usize
	}

	pub fn background_id(self) -> &'static str {
		match self {
			Section::Origination => "bg-origination",
			Section::Validation => "bg-validation",
			Section::Middleware => "bg-middleware",
			Section::Processing => "bg-processing",
		}
	}

	pub fn title(self) -> &'static str {
		match self {
			Section::Origination => "Origination",
			Section::Validation => "Payment Validation and Routing",
			Section::Middleware => "Middleware",
			Section::Processing => "Payment Processing, Sanctions & Investigation",
		}
	}

	pub fn from_background_id(id: &str) -> Option<Section> {
		Section::ALL.into_iter().find(|s| s.background_id() == id)
	}

	/// Map a dataset classification string to its section.
	///
	/// Several spellings are accepted because source datasets disagree.
	pub fn from_class(class: &str) -> Option<Section> {
		match class.trim().to_lowercase().as_str() {
			"origination" => Some(Section::Origination),
			"payment validation and routing" => Some(Section::Validation),
			"middleware" | "payment processing / middleware" => Some(Section::Middleware),
			"payment processing, sanctions and investigation" | "clearing / settlement" => {
				Some(Section::Processing)
			}
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
	pub width: f64,
	pub height: f64,
}

impl Size {
	pub const fn new(width: f64, height: f64) -> Self {
		Self { width, height }
	}
}

/// How a regular node came to sit inside its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
	/// Slotted into a section column from its classification.
	Section(Section),
	/// The dataset named the parent explicitly.
	Explicit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegularNode {
	pub display_name: String,
	pub subtitle: String,
	/// Always set: either a section background id or an explicit parent.
	pub parent_id: String,
	pub placement: Placement,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
	/// One of the four canonical section columns.
	SectionBackground { section: Section, size: Size },
	/// A non-canonical background container supplied by the dataset.
	Group { title: String, size: Size },
	Regular(RegularNode),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
	pub id: String,
	pub kind: NodeKind,
	/// Derived by layout, never authoritative.
	pub position: Point,
}

impl GraphNode {
	pub fn title(&self) -> &str {
		match &self.kind {
			NodeKind::SectionBackground { section, .. } => section.title(),
			NodeKind::Group { title, .. } => title,
			NodeKind::Regular(r) => &r.display_name,
		}
	}

	pub fn size(&self) -> Option<Size> {
		match &self.kind {
			NodeKind::SectionBackground { size, .. } | NodeKind::Group { size, .. } => Some(*size),
			NodeKind::Regular(_) => None,
		}
	}

	pub fn as_regular(&self) -> Option<&RegularNode> {
		match &self.kind {
			NodeKind::Regular(r) => Some(r),
			_ => None,
		}
	}

	pub fn is_regular(&self) -> bool {
		self.as_regular().is_some()
	}
}

/// Stroke applied to every edge by the loader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeStyle {
	pub stroke: &'static str,
	pub width: f64,
	pub marker_start: bool,
	pub marker_end: bool,
}

impl Default for EdgeStyle {
	fn default() -> Self {
		Self {
			stroke: "#6b7280",
			width: 2.0,
			marker_start: true,
			marker_end: true,
		}
	}
}

pub const DEFAULT_EDGE_KIND: &str = "default";

#[derive(Clone, Debug, PartialEq)]
pub struct GraphEdge {
	pub id: String,
	pub source: String,
	pub target: String,
	pub kind: String,
	pub style: EdgeStyle,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowGraph {
	pub nodes: Vec<GraphNode>,
	pub edges: Vec<GraphEdge>,
}

impl FlowGraph {
	pub fn node(&self, id: &str) -> Option<&GraphNode> {
		self.nodes.iter().find(|n| n.id == id)
	}

	pub fn regular_nodes(&self) -> impl Iterator<Item = (&GraphNode, &RegularNode)> {
		self.nodes
			.iter()
			.filter_map(|n| n.as_regular().map(|r| (n, r)))
	}
}

// Raw dataset documents.

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawDataset {
	#[serde(default)]
	pub nodes: Vec<RawNode>,
	#[serde(default)]
	pub edges: Vec<RawEdge>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawLabel {
	#[serde(default)]
	pub label: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
	pub id: String,
	#[serde(default)]
	pub data: Option<RawLabel>,
	#[serde(default, rename = "class")]
	pub class: Option<String>,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	#[serde(default)]
	pub label: Option<String>,
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub subtext: Option<String>,
	#[serde(default)]
	pub parent_id: Option<String>,
	/// Offset inside an explicit parent.
	#[serde(default)]
	pub position: Option<Point>,
}

/// A single target or a fan-out list.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EdgeTarget {
	One(String),
	Many(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawEdge {
	pub id: String,
	pub source: String,
	pub target: EdgeTarget,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
}

impl From<&GraphEdge> for RawEdge {
	fn from(edge: &GraphEdge) -> Self {
		Self {
			id: edge.id.clone(),
			source: edge.source.clone(),
			target: EdgeTarget::One(edge.target.clone()),
			kind: Some(edge.kind.clone()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn class_aliases_resolve() {
		assert_eq!(Section::from_class("origination"), Some(Section::Origination));
		assert_eq!(
			Section::from_class("  Payment Processing / Middleware "),
			Some(Section::Middleware)
		);
		assert_eq!(
			Section::from_class("clearing / settlement"),
			Some(Section::Processing)
		);
		assert_eq!(Section::from_class("mainframe"), None);
	}

	#[test]
	fn sections_round_trip_their_background_ids() {
		for section in Section::ALL {
			assert_eq!(Section::from_background_id(section.background_id()), Some(section));
		}
		assert_eq!(Section::from_background_id("bg-other"), None);
	}

	#[test]
	fn edge_target_accepts_string_or_list() {
		let one: RawEdge =
			serde_json::from_str(r#"{"id":"e","source":"A","target":"B"}"#).unwrap();
		assert_eq!(one.target, EdgeTarget::One("B".into()));
		let many: RawEdge =
			serde_json::from_str(r#"{"id":"e","source":"A","target":["B","C"],"type":"step"}"#)
				.unwrap();
		assert_eq!(many.target, EdgeTarget::Many(vec!["B".into(), "C".into()]));
		assert_eq!(many.kind.as_deref(), Some("step"));
	}
}
