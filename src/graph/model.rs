/// Structural queries and invariant validation over a workflow graph
///
/// Pure read-only checks; nothing here mutates. The mutation engine re-runs
/// `validate` after every merge and rejects the mutation as a whole when the
/// violation list is non-empty.

use std::collections::HashSet;

use crate::error::Violation;
use crate::graph::types::{Node, NodeType, Workflow};
use crate::runtime::scheduler::{self, SchedulePolicy};

/// Validate a workflow against the structural invariants:
/// unique node ids, edge endpoints that exist, at most one response node,
/// response node strictly terminal, and DAG-ness (cycle check delegated to
/// the scheduler).
///
/// Returns every violation found, not just the first.
pub fn validate(workflow: &Workflow) -> Vec<Violation> {
    let mut violations = Vec::new();

    // Node id uniqueness
    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(node.id.as_str()) {
            violations.push(Violation::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    // Edge endpoint existence
    for edge in &workflow.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !seen.contains(endpoint.as_str()) {
                violations.push(Violation::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }

    // Single-response invariant
    let responses = find_nodes_by_type(workflow, NodeType::Response);
    if responses.len() > 1 {
        violations.push(Violation::MultipleResponseNodes {
            count: responses.len(),
        });
    }

    // Response node must be a sink
    for response in &responses {
        let has_outgoing = workflow.edges.iter().any(|e| {
            e.source == response.id && seen.contains(e.target.as_str())
        });
        if has_outgoing {
            violations.push(Violation::ResponseNotTerminal {
                node_id: response.id.clone(),
            });
        }
    }

    // DAG-ness, via the scheduler's Kahn pass
    if scheduler::order(workflow, SchedulePolicy::default()).is_err() {
        violations.push(Violation::CycleDetected);
    }

    violations
}

/// All nodes of the given type, in insertion order.
pub fn find_nodes_by_type(workflow: &Workflow, node_type: NodeType) -> Vec<&Node> {
    workflow
        .nodes
        .iter()
        .filter(|n| n.node_type == node_type)
        .collect()
}

/// Nodes with no outgoing edge (dangling edges don't count as outgoing).
///
/// These are the fan-in candidates the mutation engine wires into the
/// response node during terminal normalization.
pub fn terminal_candidates(workflow: &Workflow) -> Vec<&Node> {
    let ids: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();
    workflow
        .nodes
        .iter()
        .filter(|n| {
            !workflow
                .edges
                .iter()
                .any(|e| e.source == n.id && ids.contains(e.target.as_str()))
        })
        .collect()
}
