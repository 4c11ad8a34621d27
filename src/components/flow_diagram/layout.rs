//! Section-column layout.
//!
//! Loading produces a *template* graph in a fixed 1650x960 reference frame.
//! Every viewport change re-derives the live graph from that template: section
//! backgrounds are stretched to their share of the width, and children keep
//! the same fractional offset inside their section.

use std::collections::HashMap;

use super::types::{FlowGraph, GraphNode, NodeKind, Point, Section, Size};

pub const TEMPLATE_HEIGHT: f64 = 960.0;

/// `(x, width)` of each section in the reference frame.
const TEMPLATE_COLUMNS: [(f64, f64); 4] = [(0.0, 350.0), (350.0, 350.0), (700.0, 450.0), (1150.0, 500.0)];

const ORIGINATION_SLOTS: &[Point] = &[
	Point::new(50.0, 100.0),
	Point::new(50.0, 220.0),
	Point::new(50.0, 340.0),
	Point::new(50.0, 460.0),
	Point::new(50.0, 580.0),
	Point::new(50.0, 700.0),
];
const VALIDATION_SLOTS: &[Point] = &[
	Point::new(425.0, 100.0),
	Point::new(425.0, 220.0),
	Point::new(425.0, 340.0),
	Point::new(425.0, 480.0),
	Point::new(425.0, 590.0),
	Point::new(425.0, 700.0),
];
const MIDDLEWARE_SLOTS: &[Point] = &[
	Point::new(750.0, 220.0),
	Point::new(950.0, 400.0),
	Point::new(750.0, 340.0),
	Point::new(950.0, 220.0),
	Point::new(750.0, 460.0),
];
const PROCESSING_SLOTS: &[Point] = &[
	Point::new(1200.0, 160.0),
	Point::new(1420.0, 160.0),
	Point::new(1310.0, 300.0),
	Point::new(1310.0, 420.0),
	Point::new(1200.0, 580.0),
	Point::new(1200.0, 700.0),
	Point::new(1200.0, 820.0),
];

/// `(base_x, slots)` for a section.
fn slot_table(section: Section) -> (f64, &'static [Point]) {
	match section {
		Section::Origination => (50.0, ORIGINATION_SLOTS),
		Section::Validation => (425.0, VALIDATION_SLOTS),
		Section::Middleware => (750.0, MIDDLEWARE_SLOTS),
		Section::Processing => (1200.0, PROCESSING_SLOTS),
	}
}

/// Section background in the reference frame.
pub fn template_background(section: Section) -> GraphNode {
	let (x, width) = TEMPLATE_COLUMNS[section.index()];
	GraphNode {
		id: section.background_id().to_string(),
		kind: NodeKind::SectionBackground {
			section,
			size: Size::new(width, TEMPLATE_HEIGHT),
		},
		position: Point::new(x, 0.0),
	}
}

pub fn template_backgrounds() -> Vec<GraphNode> {
	Section::ALL.into_iter().map(template_background).collect()
}

/// Hands out per-section slot positions in encounter order.
///
/// Order matters: shuffling the dataset shuffles the layout.
#[derive(Clone, Debug, Default)]
pub struct SlotAllocator {
	counters: [usize; 4],
}

impl SlotAllocator {
	pub fn next(&mut self, section: Section) -> Point {
		let index = self.counters[section.index()];
		self.counters[section.index()] += 1;
		let (base_x, slots) = slot_table(section);
		slots
			.get(index)
			.copied()
			.unwrap_or_else(|| Point::new(base_x, 100.0 + index as f64 * 120.0))
	}
}

/// Horizontal extent of one section at the current viewport size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionRect {
	pub section: Section,
	pub x: f64,
	pub width: f64,
	pub height: f64,
}

/// Split the viewport into section columns.
///
/// Widths always sum to `width - 3 * gap` (clamped at zero for viewports
/// narrower than the gaps).
pub fn section_rects(viewport: Size, proportions: &[f64; 4], gap: f64) -> [SectionRect; 4] {
	let total_gap = gap * (Section::ALL.len() - 1) as f64;
	let available = (viewport.width - total_gap).max(0.0);
	let mut x = 0.0;
	Section::ALL.map(|section| {
		let width = available * proportions[section.index()];
		let rect = SectionRect {
			section,
			x,
			width,
			height: viewport.height,
		};
		x += width + gap;
		rect
	})
}

/// Immutable load-time graph plus the child offsets derived from it.
#[derive(Clone, Debug, Default)]
pub struct LayoutTemplate {
	graph: FlowGraph,
	/// `(node.x - parent.x) / parent.width` for children of section backgrounds.
	ratios: HashMap<String, f64>,
}

impl LayoutTemplate {
	pub fn capture(graph: FlowGraph) -> Self {
		let mut ratios = HashMap::new();
		for (node, regular) in graph.regular_nodes() {
			let Some(parent) = graph.node(&regular.parent_id) else {
				continue;
			};
			if let NodeKind::SectionBackground { size, .. } = &parent.kind {
				let ratio = if size.width > 0.0 {
					(node.position.x - parent.position.x) / size.width
				} else {
					0.0
				};
				ratios.insert(node.id.clone(), ratio);
			}
		}
		Self { graph, ratios }
	}

	pub fn graph(&self) -> &FlowGraph {
		&self.graph
	}

	pub fn ratio(&self, node_id: &str) -> Option<f64> {
		self.ratios.get(node_id).copied()
	}

	/// Position every node for the given viewport.
	pub fn layout(&self, viewport: Size, proportions: &[f64; 4], gap: f64) -> FlowGraph {
		let rects = section_rects(viewport, proportions, gap);
		let rect_of = |parent_id: &str| Section::from_background_id(parent_id).map(|s| rects[s.index()]);

		let nodes = self
			.graph
			.nodes
			.iter()
			.map(|node| {
				let mut node = node.clone();
				match &mut node.kind {
					NodeKind::SectionBackground { section, size } => {
						let rect = rects[section.index()];
						node.position = Point::new(rect.x, 0.0);
						*size = Size::new(rect.width, rect.height);
					}
					NodeKind::Regular(regular) => {
						if let (Some(rect), Some(ratio)) =
							(rect_of(&regular.parent_id), self.ratio(&node.id))
						{
							node.position.x = rect.x + ratio * rect.width;
						}
					}
					NodeKind::Group { .. } => {}
				}
				node
			})
			.collect();

		FlowGraph {
			nodes,
			edges: self.graph.edges.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::flow_diagram::types::{Placement, RegularNode};
	use crate::config::DEFAULT_PROPORTIONS;

	const EPS: f64 = 1e-9;

	fn child(id: &str, section: Section, position: Point) -> GraphNode {
		GraphNode {
			id: id.into(),
			kind: NodeKind::Regular(RegularNode {
				display_name: id.into(),
				subtitle: format!("AIT {id}"),
				parent_id: section.background_id().into(),
				placement: Placement::Section(section),
			}),
			position,
		}
	}

	fn template() -> LayoutTemplate {
		let mut nodes = template_backgrounds();
		nodes.push(child("1", Section::Origination, Point::new(50.0, 100.0)));
		nodes.push(child("2", Section::Middleware, Point::new(950.0, 400.0)));
		nodes.push(child("3", Section::Processing, Point::new(1420.0, 160.0)));
		nodes.push(GraphNode {
			id: "512".into(),
			kind: NodeKind::Regular(RegularNode {
				display_name: "Swift Alliance".into(),
				subtitle: "AIT 512".into(),
				parent_id: Section::Processing.background_id().into(),
				placement: Placement::Explicit,
			}),
			position: Point::new(1150.0 + 40.0, 160.0),
		});
		LayoutTemplate::capture(FlowGraph {
			nodes,
			edges: vec![],
		})
	}

	#[test]
	fn slots_follow_encounter_order_then_stack() {
		let mut slots = SlotAllocator::default();
		let placed: Vec<Point> = (0..7).map(|_| slots.next(Section::Middleware)).collect();
		assert_eq!(placed[0], Point::new(750.0, 220.0));
		assert_eq!(placed[1], Point::new(950.0, 400.0));
		assert_eq!(placed[4], Point::new(750.0, 460.0));
		assert_eq!(placed[5], Point::new(750.0, 100.0 + 5.0 * 120.0));
		assert_eq!(placed[6], Point::new(750.0, 100.0 + 6.0 * 120.0));
		// other sections keep their own counter
		assert_eq!(slots.next(Section::Origination), Point::new(50.0, 100.0));
	}

	#[test]
	fn section_widths_fill_viewport_in_order() {
		for width in [320.0, 1024.0, 1650.0, 2560.0] {
			let rects = section_rects(Size::new(width, 800.0), &DEFAULT_PROPORTIONS, 16.0);
			let total: f64 = rects.iter().map(|r| r.width).sum();
			assert!((total - (width - 48.0)).abs() < EPS);
			for pair in rects.windows(2) {
				assert!((pair[1].x - (pair[0].x + pair[0].width + 16.0)).abs() < EPS);
			}
			assert_eq!(rects.map(|r| r.section), Section::ALL);
			assert!(rects.iter().all(|r| r.height == 800.0));
		}
	}

	#[test]
	fn narrow_viewport_collapses_to_zero_width() {
		let rects = section_rects(Size::new(20.0, 100.0), &DEFAULT_PROPORTIONS, 16.0);
		assert!(rects.iter().all(|r| r.width == 0.0));
	}

	#[test]
	fn children_keep_relative_offset_across_resizes() {
		let template = template();
		for (w, h) in [(800.0, 600.0), (1920.0, 1080.0), (1234.5, 700.0)] {
			let graph = template.layout(Size::new(w, h), &DEFAULT_PROPORTIONS, 16.0);
			for (node, regular) in graph.regular_nodes() {
				let parent = graph.node(&regular.parent_id).unwrap();
				let width = parent.size().unwrap().width;
				let ratio = (node.position.x - parent.position.x) / width;
				assert!((ratio - template.ratio(&node.id).unwrap()).abs() < 1e-9);
			}
		}
	}

	#[test]
	fn explicit_child_scales_with_its_parent() {
		let template = template();
		assert!((template.ratio("512").unwrap() - 40.0 / 500.0).abs() < EPS);
		let graph = template.layout(Size::new(1000.0, 500.0), &DEFAULT_PROPORTIONS, 16.0);
		let parent = graph.node("bg-processing").unwrap();
		let node = graph.node("512").unwrap();
		let width = parent.size().unwrap().width;
		assert!((node.position.x - (parent.position.x + width * 40.0 / 500.0)).abs() < EPS);
		assert_eq!(node.position.y, 160.0);
	}

	#[test]
	fn backgrounds_are_repositioned_not_recreated() {
		let template = template();
		let graph = template.layout(Size::new(1000.0, 500.0), &DEFAULT_PROPORTIONS, 16.0);
		assert_eq!(graph.nodes.len(), template.graph().nodes.len());
		let bg = graph.node("bg-validation").unwrap();
		let expected = (1000.0 - 48.0) * 0.2;
		assert!((bg.position.x - (expected + 16.0)).abs() < EPS);
		assert_eq!(bg.position.y, 0.0);
		assert_eq!(bg.size(), Some(Size::new(expected, 500.0)));
	}

	#[test]
	fn vertical_position_is_untouched() {
		let graph = template().layout(Size::new(900.0, 300.0), &DEFAULT_PROPORTIONS, 16.0);
		assert_eq!(graph.node("2").unwrap().position.y, 400.0);
	}
}
