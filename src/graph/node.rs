//! Nullability nodes and their arena.
//!
//! Nodes are identity objects: a node's meaning is its position in the flow
//! graph, not its payload. The three special singletons are interned at
//! fixed indices and are terminal: they never change classification.

use crate::graph::edge::EdgeId;
use serde::Serialize;

/// Index of a node in the [`NodeArena`].
///
/// Ids with the high bit set are *pending*: allocated inside a builder's
/// local buffer and remapped to arena ids when the builder's commit is
/// flushed. The three special singletons keep their fixed ids everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NULLABLE: NodeId = NodeId(0);
    pub const NON_NULL: NodeId = NodeId(1);
    pub const OBLIVIOUS: NodeId = NodeId(2);

    const PENDING_BIT: u32 = 1 << 31;

    pub fn pending(index: usize) -> NodeId {
        debug_assert!((index as u32) < Self::PENDING_BIT);
        NodeId(index as u32 | Self::PENDING_BIT)
    }

    pub fn is_pending(&self) -> bool {
        self.0 & Self::PENDING_BIT != 0
    }

    pub fn pending_index(&self) -> usize {
        debug_assert!(self.is_pending());
        (self.0 & !Self::PENDING_BIT) as usize
    }

    pub fn is_special(&self) -> bool {
        self.0 <= 2
    }
}

/// Classification of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullability {
    Nullable,
    NonNull,
    Oblivious,
    /// To be determined by the solver.
    Inferred,
}

/// One vertex of the flow graph.
#[derive(Clone, Debug, Serialize)]
pub struct NullabilityNode {
    pub nullability: Nullability,
    /// Human-readable name for debugging and graph export.
    pub name: Option<String>,
    pub incoming: Vec<EdgeId>,
    pub outgoing: Vec<EdgeId>,
}

impl NullabilityNode {
    pub fn new(nullability: Nullability, name: Option<String>) -> Self {
        NullabilityNode {
            nullability,
            name,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }
}

/// Arena of all nodes in a graph.
#[derive(Clone, Debug, Serialize)]
pub struct NodeArena {
    nodes: Vec<NullabilityNode>,
}

impl NodeArena {
    /// Create an arena with the three special singletons interned.
    pub fn new() -> Self {
        let mut arena = NodeArena { nodes: Vec::new() };
        arena.push(NullabilityNode::new(
            Nullability::Nullable,
            Some("<nullable>".to_string()),
        ));
        arena.push(NullabilityNode::new(
            Nullability::NonNull,
            Some("<nonnull>".to_string()),
        ));
        arena.push(NullabilityNode::new(
            Nullability::Oblivious,
            Some("<oblivious>".to_string()),
        ));
        arena
    }

    fn push(&mut self, node: NullabilityNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Append a node record, returning its arena id.
    pub fn alloc(&mut self, node: NullabilityNode) -> NodeId {
        debug_assert!(self.nodes.len() >= 3, "special nodes must be interned first");
        self.push(node)
    }

    pub fn get(&self, id: NodeId) -> &NullabilityNode {
        debug_assert!(!id.is_pending(), "pending node id escaped its builder");
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut NullabilityNode {
        debug_assert!(!id.is_pending(), "pending node id escaped its builder");
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NullabilityNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specials_have_fixed_ids() {
        let arena = NodeArena::new();
        assert_eq!(arena.get(NodeId::NULLABLE).nullability, Nullability::Nullable);
        assert_eq!(arena.get(NodeId::NON_NULL).nullability, Nullability::NonNull);
        assert_eq!(arena.get(NodeId::OBLIVIOUS).nullability, Nullability::Oblivious);
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn pending_ids_round_trip() {
        let id = NodeId::pending(7);
        assert!(id.is_pending());
        assert!(!id.is_special());
        assert_eq!(id.pending_index(), 7);
        assert!(!NodeId::NULLABLE.is_pending());
    }
}
