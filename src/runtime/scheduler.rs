/// Topological scheduler: deterministic linear execution order
///
/// Builds a petgraph DAG from the workflow definition and linearizes it with
/// Kahn's algorithm. The seed queue is filled in node insertion order and
/// processed FIFO, so repeated calls on an unchanged graph always produce
/// the same order; `petgraph::algo::toposort` leaves that tie-break
/// unspecified, which is why the Kahn loop lives here.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{EngineError, EngineResult};
use crate::graph::types::{NodeType, Workflow};

/// Explicit scheduling policy. `skip_input_nodes` filters input-typed entry
/// markers out of the returned order: they seed the variable scope but are
/// not executed as steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulePolicy {
    pub skip_input_nodes: bool,
}

/// Compute the execution order for a workflow as a sequence of node ids.
///
/// Dangling edges (an endpoint that no longer exists) are skipped with a
/// warning rather than treated as fatal; the mutation engine is responsible
/// for rejecting them when explicitly added. Fails with `CycleDetected`
/// when the graph has no complete linearization, never a partial order.
pub fn order(workflow: &Workflow, policy: SchedulePolicy) -> EngineResult<Vec<String>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut id_to_index: HashMap<&str, NodeIndex> = HashMap::new();

    for node in &workflow.nodes {
        let index = graph.add_node(node.id.as_str());
        id_to_index.insert(node.id.as_str(), index);
    }

    for edge in &workflow.edges {
        match (
            id_to_index.get(edge.source.as_str()),
            id_to_index.get(edge.target.as_str()),
        ) {
            (Some(&from), Some(&to)) => {
                graph.add_edge(from, to, ());
            }
            _ => {
                tracing::warn!(
                    "⚠️ Skipping dangling edge '{}' ({} → {}) during traversal",
                    edge.id,
                    edge.source,
                    edge.target
                );
            }
        }
    }

    // Kahn's algorithm: in-degree bookkeeping, FIFO queue seeded in node
    // insertion order (NodeIndex order == insertion order for DiGraph).
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|idx| graph.edges_directed(idx, Direction::Incoming).count())
        .collect();

    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|idx| in_degree[idx.index()] == 0)
        .collect();

    let mut linearized: Vec<NodeIndex> = Vec::with_capacity(graph.node_count());
    while let Some(current) = queue.pop_front() {
        linearized.push(current);
        // Neighbor iteration is reverse edge-insertion order; reversing keeps
        // newly freed nodes enqueued in edge insertion order.
        let mut targets: Vec<NodeIndex> = graph
            .neighbors_directed(current, Direction::Outgoing)
            .collect();
        targets.reverse();
        for target in targets {
            let degree = &mut in_degree[target.index()];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(target);
            }
        }
    }

    if linearized.len() < graph.node_count() {
        tracing::error!(
            "❌ Workflow '{}' contains a cycle ({}/{} nodes linearized)",
            workflow.workflow_id,
            linearized.len(),
            graph.node_count()
        );
        return Err(EngineError::CycleDetected);
    }

    let by_id: HashMap<&str, NodeType> = workflow
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.node_type))
        .collect();

    Ok(linearized
        .into_iter()
        .map(|idx| graph[idx].to_string())
        .filter(|id| {
            !(policy.skip_input_nodes && by_id.get(id.as_str()) == Some(&NodeType::Input))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{Edge, Node};
    use serde_json::Map;

    fn node(id: &str, node_type: NodeType) -> Node {
        Node {
            id: id.to_string(),
            node_type,
            label: String::new(),
            fields: Map::new(),
            is_new: false,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn workflow(nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
        let mut wf = Workflow::new("wf-test", "owner-1");
        wf.nodes = nodes;
        wf.edges = edges;
        wf
    }

    #[test]
    fn linear_chain_keeps_edge_order() {
        let wf = workflow(
            vec![
                node("in", NodeType::Input),
                node("validate", NodeType::InputValidation),
                node("insert", NodeType::DbInsert),
                node("resp", NodeType::Response),
            ],
            vec![
                edge("e1", "in", "validate"),
                edge("e2", "validate", "insert"),
                edge("e3", "insert", "resp"),
            ],
        );
        let sequence = order(&wf, SchedulePolicy::default()).unwrap();
        assert_eq!(sequence, vec!["in", "validate", "insert", "resp"]);
    }

    #[test]
    fn order_is_deterministic_across_calls() {
        // Diamond: both branches are free after "in"; insertion order breaks
        // the tie the same way every time.
        let wf = workflow(
            vec![
                node("in", NodeType::Input),
                node("a", NodeType::Delay),
                node("b", NodeType::Delay),
                node("resp", NodeType::Response),
            ],
            vec![
                edge("e1", "in", "a"),
                edge("e2", "in", "b"),
                edge("e3", "a", "resp"),
                edge("e4", "b", "resp"),
            ],
        );
        let first = order(&wf, SchedulePolicy::default()).unwrap();
        for _ in 0..10 {
            assert_eq!(order(&wf, SchedulePolicy::default()).unwrap(), first);
        }
        assert_eq!(first.last().map(String::as_str), Some("resp"));
    }

    #[test]
    fn cycle_fails_instead_of_guessing() {
        let wf = workflow(
            vec![node("a", NodeType::Delay), node("b", NodeType::Delay)],
            vec![edge("e1", "a", "b"), edge("e2", "b", "a")],
        );
        assert!(matches!(
            order(&wf, SchedulePolicy::default()),
            Err(EngineError::CycleDetected)
        ));
    }

    #[test]
    fn dangling_edge_is_ignored_during_traversal() {
        let wf = workflow(
            vec![node("a", NodeType::Input), node("b", NodeType::Response)],
            vec![edge("e1", "a", "b"), edge("e2", "ghost", "b")],
        );
        let sequence = order(&wf, SchedulePolicy::default()).unwrap();
        assert_eq!(sequence, vec!["a", "b"]);
    }

    #[test]
    fn policy_filters_input_nodes_from_the_order() {
        let wf = workflow(
            vec![node("in", NodeType::Input), node("resp", NodeType::Response)],
            vec![edge("e1", "in", "resp")],
        );
        let sequence = order(
            &wf,
            SchedulePolicy {
                skip_input_nodes: true,
            },
        )
        .unwrap();
        assert_eq!(sequence, vec!["resp"]);
    }
}
