/// Mutation engine: merges an untrusted proposal delta into a workflow
///
/// The delta typically comes from an LLM call and may violate every invariant
/// the graph is supposed to hold, so the merge is defensive throughout and
/// all-or-nothing: it works on a clone, re-validates at the end, and hands
/// back either a fully valid new graph or an error with the pre-mutation
/// graph untouched at the caller.

use std::collections::{HashMap, HashSet};

use serde_json::Map;

use crate::error::{EngineError, EngineResult};
use crate::graph::model;
use crate::graph::types::{Edge, GraphDelta, Node, NodeConfig, NodeType, Workflow};

/// Result of a successful merge.
#[derive(Debug)]
pub struct MergeOutcome {
    pub workflow: Workflow,
    /// Number of nodes appended (as opposed to merged into existing ones)
    pub nodes_added: usize,
}

/// Merge `delta` into `existing`, producing a new valid workflow.
///
/// Steps, in order:
/// 1. proposal sanity checks (ids present, no duplicate ids inside the delta,
///    per-type field contracts);
/// 2. append new nodes / shallow-merge fields onto colliding ids;
/// 3. append edges whose (source, target) pair is new, dropping edges that
///    reference unknown nodes with a warning;
/// 4. response normalization: collapse to a single response node, move it to
///    the end, and fan in every sink so the response is reachable from all
///    branches;
/// 5. full re-validation; any violation rejects the mutation as a whole.
pub fn merge(existing: &Workflow, delta: &GraphDelta) -> EngineResult<MergeOutcome> {
    check_proposal(delta)?;

    let mut working = existing.clone();
    // `isNew` is a transient annotation from the previous merge; clear it
    // before marking this round's additions.
    for node in &mut working.nodes {
        node.is_new = false;
    }

    let nodes_added = merge_nodes(&mut working, delta);
    merge_edges(&mut working, delta);
    normalize_response(&mut working);

    let violations = model::validate(&working);
    if !violations.is_empty() {
        tracing::warn!(
            "❌ Mutation rejected for workflow '{}': {} violation(s)",
            existing.workflow_id,
            violations.len()
        );
        return Err(EngineError::Validation(violations));
    }

    working.updated_at = chrono::Utc::now();
    tracing::info!(
        "✅ Merged delta into workflow '{}': {} node(s) added, {} total",
        working.workflow_id,
        nodes_added,
        working.nodes.len()
    );

    Ok(MergeOutcome {
        workflow: working,
        nodes_added,
    })
}

/// Reject malformed proposals before touching the graph: missing ids,
/// duplicate ids within the delta, or broken per-type field contracts.
fn check_proposal(delta: &GraphDelta) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for node in &delta.nodes {
        if node.id.trim().is_empty() {
            return Err(EngineError::Proposal(
                "proposed node is missing an id".to_string(),
            ));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(EngineError::Proposal(format!(
                "proposed delta contains node id '{}' more than once",
                node.id
            )));
        }
        // Field contracts are enforced here, at mutation time, so a bad
        // emailSend or response never reaches execution.
        NodeConfig::from_node(node)?;
    }
    for edge in &delta.edges {
        if edge.source.trim().is_empty() || edge.target.trim().is_empty() {
            return Err(EngineError::Proposal(format!(
                "proposed edge '{}' is missing an endpoint",
                edge.id
            )));
        }
    }
    Ok(())
}

/// Append new nodes in delta order; a colliding id shallow-merges the delta's
/// fields onto the existing node instead of duplicating it.
fn merge_nodes(working: &mut Workflow, delta: &GraphDelta) -> usize {
    let mut nodes_added = 0;
    for proposed in &delta.nodes {
        // Response replacement and id collisions share the merge path; the
        // normalization pass below is what guarantees a single survivor.
        match working.nodes.iter().position(|n| n.id == proposed.id) {
            Some(pos) => {
                let node = &mut working.nodes[pos];
                if node.node_type != proposed.node_type {
                    tracing::warn!(
                        "⚠️ Delta node '{}' type {} collides with existing {}; keeping existing type",
                        proposed.id,
                        proposed.node_type.tag(),
                        node.node_type.tag()
                    );
                }
                shallow_merge(&mut node.fields, &proposed.fields);
                if !proposed.label.is_empty() {
                    node.label = proposed.label.clone();
                }
            }
            None => {
                let mut node = proposed.clone();
                node.is_new = true;
                working.nodes.push(node);
                nodes_added += 1;
            }
        }
    }
    nodes_added
}

/// Append delta edges whose (source, target) pair is new. Edges referencing
/// unknown node ids are dropped with a warning, never persisted.
fn merge_edges(working: &mut Workflow, delta: &GraphDelta) {
    let known: HashSet<String> = working.nodes.iter().map(|n| n.id.clone()).collect();
    let mut pairs: HashSet<(String, String)> = working
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();

    for edge in &delta.edges {
        if !known.contains(&edge.source) || !known.contains(&edge.target) {
            tracing::warn!(
                "⚠️ Dropping proposed edge '{}' ({} → {}): unknown endpoint",
                edge.id,
                edge.source,
                edge.target
            );
            continue;
        }
        if pairs.insert((edge.source.clone(), edge.target.clone())) {
            working.edges.push(edge.clone());
        }
    }
}

/// Enforce the terminal invariant by construction: at most one response node,
/// always last in the node sequence, reachable from every sink.
///
/// Wherever the delta tried to place a response node, this pass collapses
/// all response-typed nodes into the most recently specified one (its fields
/// win, earlier ones act as defaults), re-points edges that targeted a
/// removed response, and adds a fan-in edge from every remaining sink.
fn normalize_response(working: &mut Workflow) {
    let response_ids: Vec<String> = working
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Response)
        .map(|n| n.id.clone())
        .collect();
    let Some(surviving_id) = response_ids.last().cloned() else {
        return;
    };

    // Fold fields across all response nodes in order; later ones override.
    let mut folded: Map<String, serde_json::Value> = Map::new();
    let mut label = String::new();
    let mut is_new = false;
    for node in working
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Response)
    {
        shallow_merge(&mut folded, &node.fields);
        if !node.label.is_empty() {
            label = node.label.clone();
        }
        is_new = node.is_new;
    }

    let removed: HashSet<String> = response_ids
        .iter()
        .filter(|id| **id != surviving_id)
        .cloned()
        .collect();

    // Re-point edges that targeted a removed response node; drop edges that
    // originated from any response node (a response cannot have successors).
    let mut rewired: Vec<Edge> = Vec::with_capacity(working.edges.len());
    let mut pairs: HashSet<(String, String)> = HashSet::new();
    for mut edge in working.edges.drain(..) {
        if removed.contains(&edge.target) {
            edge.target = surviving_id.clone();
        }
        if edge.source == surviving_id || removed.contains(&edge.source) {
            tracing::warn!(
                "⚠️ Dropping edge '{}' out of response node '{}'",
                edge.id,
                edge.source
            );
            continue;
        }
        if pairs.insert((edge.source.clone(), edge.target.clone())) {
            rewired.push(edge);
        }
    }
    working.edges = rewired;

    // Remove every response node, then re-insert the survivor last.
    working.nodes.retain(|n| n.node_type != NodeType::Response);
    working.nodes.push(Node {
        id: surviving_id.clone(),
        node_type: NodeType::Response,
        label,
        fields: folded,
        is_new,
    });

    // Fan-in: every sink (no outgoing edge, response excluded) gains an edge
    // into the response so it is reachable from all branches.
    let sink_ids: Vec<String> = model::terminal_candidates(working)
        .into_iter()
        .filter(|n| n.id != surviving_id)
        .map(|n| n.id.clone())
        .collect();
    for sink in sink_ids {
        let exists = working
            .edges
            .iter()
            .any(|e| e.source == sink && e.target == surviving_id);
        if !exists {
            working.edges.push(Edge {
                id: format!("edge-{sink}-{surviving_id}"),
                source: sink,
                target: surviving_id.clone(),
            });
        }
    }
}

/// Replace-mutation semantics: keys in `incoming` overwrite `base`, keys
/// absent from `incoming` survive untouched.
fn shallow_merge(base: &mut Map<String, serde_json::Value>, incoming: &Map<String, serde_json::Value>) {
    for (key, value) in incoming {
        base.insert(key.clone(), value.clone());
    }
}
