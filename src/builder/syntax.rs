//! The syntactic visitor: written types to node trees.
//!
//! One node per reference-type syntax occurrence. Bare reference types get a
//! fresh inferred node, `T?` over a reference type pins the nullable
//! singleton, value types carry the oblivious node. Every visited occurrence
//! is recorded in the tree's syntax-to-node mapping.

use crate::builder::GraphBuilder;
use crate::graph::NodeId;
use crate::lang::{TupleElementSyntax, Ty, TypeSyntax};
use crate::type_node::TypeWithNode;

pub fn visit_type_syntax(builder: &mut GraphBuilder<'_>, syntax: &TypeSyntax) -> TypeWithNode {
    let unit = builder.unit;
    match syntax {
        TypeSyntax::Named { id, def, args, nullable } => {
            let record = unit.defs.get(*def);
            let args: Vec<TypeWithNode> =
                args.iter().map(|a| visit_type_syntax(builder, a)).collect();
            let ty = Ty::Named {
                def: *def,
                args: args.iter().map(|a| a.ty.clone()).collect(),
            };
            if record.is_value_type() {
                let inner = TypeWithNode::new(ty, NodeId::OBLIVIOUS, args);
                builder.record_mapping(*id, NodeId::OBLIVIOUS);
                if *nullable {
                    let wrapper = Ty::named_with(
                        unit.defs.builtins.nullable,
                        vec![inner.ty.clone()],
                    );
                    return TypeWithNode::new(wrapper, NodeId::OBLIVIOUS, vec![inner]);
                }
                return inner;
            }
            let node = if *nullable {
                NodeId::NULLABLE
            } else {
                builder.fresh_node(format!("{}@{}", record.name, id.0))
            };
            builder.record_mapping(*id, node);
            TypeWithNode::new(ty, node, args)
        }
        TypeSyntax::Array { id, elem, nullable } => {
            let elem = visit_type_syntax(builder, elem);
            let node = if *nullable {
                NodeId::NULLABLE
            } else {
                builder.fresh_node(format!("array@{}", id.0))
            };
            builder.record_mapping(*id, node);
            TypeWithNode::new(Ty::Array(Box::new(elem.ty.clone())), node, vec![elem])
        }
        TypeSyntax::Tuple { id, elems } => {
            let args: Vec<TypeWithNode> = elems
                .iter()
                .map(|TupleElementSyntax { ty, .. }| visit_type_syntax(builder, ty))
                .collect();
            let ty = Ty::Tuple(args.iter().map(|a| a.ty.clone()).collect());
            builder.record_mapping(*id, NodeId::OBLIVIOUS);
            TypeWithNode::new(ty, NodeId::OBLIVIOUS, args)
        }
        TypeSyntax::Param { id, param, nullable } => {
            let node = if *nullable {
                NodeId::NULLABLE
            } else {
                builder.fresh_node(format!("param@{}", id.0))
            };
            builder.record_mapping(*id, node);
            TypeWithNode::leaf(Ty::Param(*param), node)
        }
        TypeSyntax::Fn { id, params, ret } => {
            let mut args: Vec<TypeWithNode> =
                params.iter().map(|p| visit_type_syntax(builder, p)).collect();
            args.push(visit_type_syntax(builder, ret));
            let ret_ty = args.last().unwrap().ty.clone();
            let ty = Ty::Fn {
                params: args[..args.len() - 1].iter().map(|a| a.ty.clone()).collect(),
                ret: Box::new(ret_ty),
            };
            let node = builder.fresh_node(format!("fn@{}", id.0));
            builder.record_mapping(*id, node);
            TypeWithNode::new(ty, node, args)
        }
        TypeSyntax::Implicit { .. } => {
            unreachable!("implicitly typed positions adopt their initializer's nodes")
        }
    }
}
