mod component;
pub mod layout;
pub mod loader;
mod render;
pub mod state;
pub mod status;
pub mod transactions;
pub mod types;

pub use component::{DiagramSnapshot, FlowDiagramCanvas};
pub use loader::{FLOW_OPTIONS, FlowOption};
pub use types::{FlowGraph, GraphEdge, GraphNode, NodeKind, Section};
