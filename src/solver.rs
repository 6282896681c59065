//! Reachability over the flow graph and verdict assignment.
//!
//! A node is forced nullable iff the nullable singleton reaches it; forced
//! non-null iff it reaches the non-null singleton. Both at once is a
//! contradiction, reported with the edge chains that prove it. Unforced
//! inferred nodes default to non-null, preserving the behavior of the
//! unannotated source.

use crate::diagnostics::{Diagnostic, SourceSpan};
use crate::graph::{EdgeId, NodeId, Nullability, NullabilityGraph};
use crate::options::InferenceOptions;
use crate::registry::TypeSystem;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

/// The final annotation for one syntactic reference-type occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Nullable,
    NonNull,
    Oblivious,
}

/// Reachability from and to the special singletons, with predecessor edges
/// kept for diagnostic chains.
pub struct GraphSolution {
    from_nullable: Vec<Option<EdgeId>>,
    reached_from_nullable: Vec<bool>,
    to_nonnull: Vec<Option<EdgeId>>,
    reaches_nonnull: Vec<bool>,
}

impl GraphSolution {
    pub fn forced_nullable(&self, node: NodeId) -> bool {
        self.reached_from_nullable[node.0 as usize]
    }

    pub fn forced_nonnull(&self, node: NodeId) -> bool {
        self.reaches_nonnull[node.0 as usize]
    }

    /// The edge chain from the nullable singleton to `node`, in path order.
    pub fn nullable_chain(&self, graph: &NullabilityGraph, node: NodeId) -> Vec<EdgeId> {
        let mut chain = Vec::new();
        let mut current = node;
        while let Some(edge) = self.from_nullable[current.0 as usize] {
            chain.push(edge);
            current = graph.edge(edge).source;
        }
        chain.reverse();
        chain
    }

    /// The edge chain from `node` to the non-null singleton, in path order.
    pub fn nonnull_chain(&self, graph: &NullabilityGraph, node: NodeId) -> Vec<EdgeId> {
        let mut chain = Vec::new();
        let mut current = node;
        while let Some(edge) = self.to_nonnull[current.0 as usize] {
            chain.push(edge);
            current = graph.edge(edge).target;
        }
        chain
    }
}

/// Compute both reachability sweeps.
pub fn solve(graph: &NullabilityGraph) -> GraphSolution {
    let n = graph.node_count();
    let mut solution = GraphSolution {
        from_nullable: vec![None; n],
        reached_from_nullable: vec![false; n],
        to_nonnull: vec![None; n],
        reaches_nonnull: vec![false; n],
    };

    // forward sweep from the nullable singleton
    let mut queue = VecDeque::new();
    solution.reached_from_nullable[NodeId::NULLABLE.0 as usize] = true;
    queue.push_back(NodeId::NULLABLE);
    while let Some(node) = queue.pop_front() {
        for &edge_id in &graph.nodes.get(node).outgoing {
            let target = graph.edge(edge_id).target;
            let slot = &mut solution.reached_from_nullable[target.0 as usize];
            if !*slot {
                *slot = true;
                solution.from_nullable[target.0 as usize] = Some(edge_id);
                queue.push_back(target);
            }
        }
    }

    // backward sweep into the non-null singleton
    let mut queue = VecDeque::new();
    solution.reaches_nonnull[NodeId::NON_NULL.0 as usize] = true;
    queue.push_back(NodeId::NON_NULL);
    while let Some(node) = queue.pop_front() {
        for &edge_id in &graph.nodes.get(node).incoming {
            let source = graph.edge(edge_id).source;
            let slot = &mut solution.reaches_nonnull[source.0 as usize];
            if !*slot {
                *slot = true;
                solution.to_nonnull[source.0 as usize] = Some(edge_id);
                queue.push_back(source);
            }
        }
    }

    solution
}

/// Is there a directed path from `from` to `to`?
///
/// Bidirectional breadth-first search; the expanded frontier alternates to
/// the smaller side, and total work is bounded by the edge count.
pub fn has_path(graph: &NullabilityGraph, from: NodeId, to: NodeId) -> bool {
    if from == to {
        return true;
    }
    let mut forward: FxHashSet<NodeId> = FxHashSet::default();
    let mut backward: FxHashSet<NodeId> = FxHashSet::default();
    forward.insert(from);
    backward.insert(to);
    let mut forward_frontier = vec![from];
    let mut backward_frontier = vec![to];
    let budget = graph.edge_count() + 1;
    let mut scanned = 0usize;

    while !forward_frontier.is_empty() && !backward_frontier.is_empty() && scanned <= budget {
        let expand_forward = forward_frontier.len() <= backward_frontier.len();
        if expand_forward {
            let mut next = Vec::new();
            for node in forward_frontier.drain(..) {
                for &edge_id in &graph.nodes.get(node).outgoing {
                    scanned += 1;
                    let target = graph.edge(edge_id).target;
                    if backward.contains(&target) {
                        return true;
                    }
                    if forward.insert(target) {
                        next.push(target);
                    }
                }
            }
            forward_frontier = next;
        } else {
            let mut next = Vec::new();
            for node in backward_frontier.drain(..) {
                for &edge_id in &graph.nodes.get(node).incoming {
                    scanned += 1;
                    let source = graph.edge(edge_id).source;
                    if forward.contains(&source) {
                        return true;
                    }
                    if backward.insert(source) {
                        next.push(source);
                    }
                }
            }
            backward_frontier = next;
        }
    }
    false
}

/// Summary counters for one inference run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct InferenceStats {
    pub trees: usize,
    pub nodes: usize,
    pub edges: usize,
    pub nullable: usize,
    pub non_null: usize,
    pub oblivious: usize,
    pub contradictions: usize,
}

/// The output of a run: per-occurrence verdicts plus diagnostics.
pub struct InferenceResult {
    pub verdicts: Vec<(SourceSpan, Verdict)>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: InferenceStats,
}

/// Solve the graph and assign a verdict to every mapped syntax occurrence.
pub fn assign_verdicts(types: &TypeSystem, options: &InferenceOptions) -> InferenceResult {
    let solution = solve(&types.graph);
    let mut diagnostics = types.diagnostics.clone();
    let mut stats = InferenceStats {
        trees: types.tree_count(),
        nodes: types.graph.node_count(),
        edges: types.graph.edge_count(),
        ..InferenceStats::default()
    };

    // Contradictions are per node, wherever the node came from.
    let mut detailed = 0usize;
    for (id, node) in types.graph.nodes.iter() {
        if node.nullability != Nullability::Inferred {
            continue;
        }
        if solution.forced_nullable(id) && solution.forced_nonnull(id) {
            stats.contradictions += 1;
            let mut diagnostic = Diagnostic::error(
                first_span(&types.graph, &solution, id),
                format!(
                    "nullability contradiction: `{}` is forced both nullable and non-null",
                    node.name.as_deref().unwrap_or("<node>")
                ),
            );
            if detailed < options.max_contradiction_paths {
                detailed += 1;
                let mut related: Vec<SourceSpan> = Vec::new();
                for edge in solution
                    .nullable_chain(&types.graph, id)
                    .into_iter()
                    .chain(solution.nonnull_chain(&types.graph, id))
                {
                    let span = types.graph.edge(edge).span;
                    if !span.is_none() {
                        related.push(span);
                    }
                }
                diagnostic = diagnostic.with_related(related);
            }
            diagnostics.push(diagnostic);
        }
    }

    let mut verdicts = Vec::new();
    for tree in 0..types.tree_count() {
        let mut entries: Vec<_> = types.mapping(tree as u32).iter().collect();
        entries.sort_by_key(|(syntax, _)| syntax.0);
        for (&syntax, &node) in entries {
            let verdict = match types.graph.nodes.get(node).nullability {
                Nullability::Oblivious => Verdict::Oblivious,
                Nullability::Nullable => Verdict::Nullable,
                Nullability::NonNull => Verdict::NonNull,
                Nullability::Inferred => {
                    // Contradictions keep the nullable side so the rewrite
                    // never silently strengthens the contract; unforced
                    // nodes default to non-null.
                    if solution.forced_nullable(node) {
                        Verdict::Nullable
                    } else {
                        Verdict::NonNull
                    }
                }
            };
            match verdict {
                Verdict::Nullable => stats.nullable += 1,
                Verdict::NonNull => stats.non_null += 1,
                Verdict::Oblivious => stats.oblivious += 1,
            }
            verdicts.push((SourceSpan::new(tree as u32, syntax), verdict));
        }
    }

    debug!(
        nodes = stats.nodes,
        edges = stats.edges,
        nullable = stats.nullable,
        non_null = stats.non_null,
        contradictions = stats.contradictions,
        "verdicts assigned"
    );
    InferenceResult { verdicts, diagnostics, stats }
}

fn first_span(graph: &NullabilityGraph, solution: &GraphSolution, node: NodeId) -> SourceSpan {
    solution
        .nullable_chain(graph, node)
        .first()
        .map(|&e| graph.edge(e).span)
        .unwrap_or(SourceSpan::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NullabilityNode;

    fn inferred(graph: &mut NullabilityGraph, name: &str) -> NodeId {
        graph
            .nodes
            .alloc(NullabilityNode::new(Nullability::Inferred, Some(name.into())))
    }

    #[test]
    fn reachability_is_transitive() {
        let mut graph = NullabilityGraph::new();
        let a = inferred(&mut graph, "a");
        let b = inferred(&mut graph, "b");
        let c = inferred(&mut graph, "c");
        graph.add_edge(a, b, "assign", SourceSpan::NONE);
        graph.add_edge(b, c, "assign", SourceSpan::NONE);
        assert!(has_path(&graph, a, c));
        assert!(!has_path(&graph, c, a));
    }

    #[test]
    fn forced_classifications_follow_the_singletons() {
        let mut graph = NullabilityGraph::new();
        let a = inferred(&mut graph, "a");
        let b = inferred(&mut graph, "b");
        graph.add_edge(NodeId::NULLABLE, a, "assign", SourceSpan::NONE);
        graph.add_edge(b, NodeId::NON_NULL, "deref", SourceSpan::NONE);
        let solution = solve(&graph);
        assert!(solution.forced_nullable(a));
        assert!(!solution.forced_nonnull(a));
        assert!(solution.forced_nonnull(b));
        assert!(!solution.forced_nullable(b));
    }

    #[test]
    fn contradiction_chains_reconstruct_both_paths() {
        let mut graph = NullabilityGraph::new();
        let a = inferred(&mut graph, "a");
        let b = inferred(&mut graph, "b");
        graph.add_edge(NodeId::NULLABLE, a, "assign", SourceSpan::NONE);
        graph.add_edge(a, b, "assign", SourceSpan::NONE);
        graph.add_edge(b, NodeId::NON_NULL, "deref", SourceSpan::NONE);
        let solution = solve(&graph);
        assert!(solution.forced_nullable(b) && solution.forced_nonnull(b));
        assert_eq!(solution.nullable_chain(&graph, b).len(), 2);
        assert_eq!(solution.nonnull_chain(&graph, b).len(), 1);
        assert_eq!(solution.nullable_chain(&graph, a).len(), 1);
    }

    #[test]
    fn bidirectional_search_meets_in_the_middle() {
        let mut graph = NullabilityGraph::new();
        let mut previous = inferred(&mut graph, "n0");
        let first = previous;
        for i in 1..32 {
            let next = inferred(&mut graph, &format!("n{i}"));
            graph.add_edge(previous, next, "assign", SourceSpan::NONE);
            previous = next;
        }
        assert!(has_path(&graph, first, previous));
        assert!(!has_path(&graph, previous, first));
    }
}
