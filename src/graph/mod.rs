//! The nullability flow graph.
//!
//! Nodes live in an arena and are referenced by index; edges own neither
//! endpoint. Both sets grow monotonically during building and are immutable
//! once the final commit has been flushed.

pub mod edge;
pub mod node;

pub use edge::{Edge, EdgeId, EdgeLabel};
pub use node::{NodeArena, NodeId, Nullability, NullabilityNode};

use crate::diagnostics::SourceSpan;
use serde::Serialize;

/// Nodes plus labeled edges.
#[derive(Clone, Debug, Serialize)]
pub struct NullabilityGraph {
    pub nodes: NodeArena,
    edges: Vec<Edge>,
}

impl NullabilityGraph {
    pub fn new() -> Self {
        NullabilityGraph {
            nodes: NodeArena::new(),
            edges: Vec::new(),
        }
    }

    /// Append an edge and wire it into both endpoint edge lists.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        label: EdgeLabel,
        span: SourceSpan,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge { source, target, label, span });
        self.nodes.get_mut(source).outgoing.push(id);
        self.nodes.get_mut(target).incoming.push(id);
        id
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0 as usize]
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| (EdgeId(i as u32), e))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for NullabilityGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NullabilityNode;

    #[test]
    fn edges_wire_both_endpoint_lists() {
        let mut graph = NullabilityGraph::new();
        let a = graph
            .nodes
            .alloc(NullabilityNode::new(Nullability::Inferred, None));
        let e = graph.add_edge(a, NodeId::NON_NULL, "deref", SourceSpan::NONE);
        assert_eq!(graph.nodes.get(a).outgoing, vec![e]);
        assert_eq!(graph.nodes.get(NodeId::NON_NULL).incoming, vec![e]);
        assert_eq!(graph.edge(e).source, a);
    }
}
