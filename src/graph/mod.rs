/// Workflow graph layer
///
/// In-memory representation of nodes and edges, structural validation, and
/// the mutation engine that folds untrusted proposal deltas into a graph
/// while preserving its invariants.

pub mod model;
pub mod mutation;
pub mod types;

pub use mutation::{merge, MergeOutcome};
pub use types::{Edge, GraphDelta, Node, NodeConfig, NodeType, Workflow};
