//! Types paired with their nullability nodes.

use crate::graph::NodeId;
use crate::lang::Ty;

/// A type paired with a tree of nullability nodes mirroring its structure.
///
/// The outer node classifies the type itself; `args` carries one child per
/// type argument, array element, tuple element, or function parameter /
/// return position, in the order of [`Ty::children`].
#[derive(Clone, Debug)]
pub struct TypeWithNode {
    pub ty: Ty,
    pub node: NodeId,
    pub args: Vec<TypeWithNode>,
}

impl TypeWithNode {
    pub fn new(ty: Ty, node: NodeId, args: Vec<TypeWithNode>) -> Self {
        debug_assert_eq!(
            args.len(),
            ty.child_count(),
            "node tree must mirror the type's shape"
        );
        TypeWithNode { ty, node, args }
    }

    /// A childless pairing; only valid for types without argument positions.
    pub fn leaf(ty: Ty, node: NodeId) -> Self {
        TypeWithNode::new(ty, node, Vec::new())
    }

    /// The same tree with a different outer node.
    pub fn with_node(&self, node: NodeId) -> Self {
        TypeWithNode {
            ty: self.ty.clone(),
            node,
            args: self.args.clone(),
        }
    }

    /// Visit every node in the tree, outer first.
    pub fn for_each_node(&self, f: &mut impl FnMut(NodeId)) {
        f(self.node);
        for arg in &self.args {
            arg.for_each_node(f);
        }
    }
}
