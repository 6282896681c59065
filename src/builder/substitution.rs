//! Generic substitution and variance-aware edge creation.

use crate::builder::GraphBuilder;
use crate::graph::NodeId;
use crate::lang::{DeclaredVariance, SyntaxId, Ty, TypeParamOwner, TypeParamRef};
use crate::type_node::TypeWithNode;

/// Direction of an assignability position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variance {
    /// Covariant: the source flows into the target.
    Out,
    /// Contravariant: the target flows into the source.
    In,
    /// Both directions.
    Invariant,
}

impl Variance {
    pub fn flip(self) -> Variance {
        match self {
            Variance::Out => Variance::In,
            Variance::In => Variance::Out,
            Variance::Invariant => Variance::Invariant,
        }
    }

    /// Compose the current direction with a declared type-parameter variance:
    /// recursing into a covariant slot preserves direction, a contravariant
    /// slot flips it, an invariant slot forces both.
    pub fn compose(self, declared: DeclaredVariance) -> Variance {
        match declared {
            DeclaredVariance::Out => self,
            DeclaredVariance::In => self.flip(),
            DeclaredVariance::Invariant => Variance::Invariant,
        }
    }
}

/// The mapping from a generic signature's type parameters to the node trees
/// chosen at a use site: class arguments from the receiver, method arguments
/// from explicit syntax or fresh inferred nodes.
#[derive(Clone, Default)]
pub struct TypeSubstitution {
    pub class_args: Vec<TypeWithNode>,
    pub method_args: Vec<TypeWithNode>,
}

impl TypeSubstitution {
    pub fn for_class(class_args: Vec<TypeWithNode>) -> Self {
        TypeSubstitution {
            class_args,
            method_args: Vec::new(),
        }
    }

    /// Look up a type-parameter slot.
    ///
    /// Returns `None` when the slot is absent (an outer-enclosing generic)
    /// or when the entry is an identity argument: a receiver typed by its
    /// own parameters. Identity entries carry the oblivious node; callers
    /// fall through to the declared node in both cases.
    pub fn lookup(&self, param: TypeParamRef) -> Option<&TypeWithNode> {
        let list = match param.owner {
            TypeParamOwner::Type => &self.class_args,
            TypeParamOwner::Method => &self.method_args,
        };
        let mapped = list.get(param.ordinal as usize)?;
        if mapped.node == NodeId::OBLIVIOUS && mapped.ty == Ty::Param(param) {
            return None;
        }
        Some(mapped)
    }

    /// Instantiate a declared node tree at this use site, replacing every
    /// substituted type-parameter position with its mapped tree.
    pub fn apply(&self, twn: &TypeWithNode) -> TypeWithNode {
        if let Ty::Param(param) = &twn.ty {
            if let Some(mapped) = self.lookup(*param) {
                return mapped.clone();
            }
            return twn.clone();
        }
        let args: Vec<TypeWithNode> = twn.args.iter().map(|a| self.apply(a)).collect();
        let ty = twn
            .ty
            .with_children(args.iter().map(|a| a.ty.clone()).collect());
        TypeWithNode { ty, node: twn.node, args }
    }
}

/// Emit a plain assignment: `source` must be consumable where `target` is
/// expected. Recurses with declared variance below the outer position.
pub fn create_assignment_edge(
    builder: &mut GraphBuilder<'_>,
    source: &TypeWithNode,
    target: &TypeWithNode,
    label: &'static str,
    syntax: SyntaxId,
) {
    create_type_edge(
        builder,
        source,
        target,
        &TypeSubstitution::default(),
        Variance::Out,
        label,
        syntax,
    );
}

/// Recursively emit edges between two node trees.
///
/// A side that names a type-parameter slot under `substitution` is replaced
/// by the mapped tree before any edge is created; once substituted, the
/// mapped tree is concrete and is not substituted again.
pub fn create_type_edge(
    builder: &mut GraphBuilder<'_>,
    source: &TypeWithNode,
    target: &TypeWithNode,
    substitution: &TypeSubstitution,
    variance: Variance,
    label: &'static str,
    syntax: SyntaxId,
) {
    if let Ty::Param(param) = &target.ty
        && let Some(mapped) = substitution.lookup(*param)
    {
        let mapped = mapped.clone();
        create_type_edge(
            builder,
            source,
            &mapped,
            &TypeSubstitution::default(),
            variance,
            label,
            syntax,
        );
        return;
    }
    if let Ty::Param(param) = &source.ty
        && let Some(mapped) = substitution.lookup(*param)
    {
        let mapped = mapped.clone();
        create_type_edge(
            builder,
            &mapped,
            target,
            &TypeSubstitution::default(),
            variance,
            label,
            syntax,
        );
        return;
    }

    match variance {
        Variance::Out => builder.add_edge(source.node, target.node, label, syntax),
        Variance::In => builder.add_edge(target.node, source.node, label, syntax),
        Variance::Invariant => {
            builder.add_edge(source.node, target.node, label, syntax);
            builder.add_edge(target.node, source.node, label, syntax);
        }
    }

    descend(builder, source, target, substitution, variance, label, syntax);
}

fn descend(
    builder: &mut GraphBuilder<'_>,
    source: &TypeWithNode,
    target: &TypeWithNode,
    substitution: &TypeSubstitution,
    variance: Variance,
    label: &'static str,
    syntax: SyntaxId,
) {
    let unit = builder.unit;
    match (&source.ty, &target.ty) {
        (Ty::Named { def: sd, .. }, Ty::Named { def: td, .. }) if sd == td => {
            let def = unit.defs.get(*sd);
            for i in 0..source.args.len().min(target.args.len()) {
                let declared = def
                    .type_params
                    .get(i)
                    .map(|p| p.variance)
                    .unwrap_or_default();
                create_type_edge(
                    builder,
                    &source.args[i],
                    &target.args[i],
                    substitution,
                    variance.compose(declared),
                    label,
                    syntax,
                );
            }
        }
        (Ty::Named { def: sd, .. }, Ty::Named { def: td, .. }) => {
            // Differing definitions: view one side through the other's
            // declared base interface and recurse over the mapped shape.
            if let Some(mapped) = substitute_base(builder, source, *td) {
                descend(builder, &mapped, target, substitution, variance, label, syntax);
            } else if let Some(mapped) = substitute_base(builder, target, *sd) {
                descend(builder, source, &mapped, substitution, variance, label, syntax);
            }
        }
        // Element stores keep arrays invariant at the nullability level even
        // though the element conversion itself is covariant.
        (Ty::Array(_), Ty::Array(_)) => {
            create_type_edge(
                builder,
                &source.args[0],
                &target.args[0],
                substitution,
                Variance::Invariant,
                label,
                syntax,
            );
        }
        (Ty::Array(_), Ty::Named { def: td, .. }) if unit.defs.is_sequence_like(*td) => {
            if let (Some(se), Some(te)) = (source.args.first(), target.args.first()) {
                create_type_edge(builder, se, te, substitution, variance, label, syntax);
            }
        }
        (Ty::Tuple(_), Ty::Tuple(_)) => {
            for i in 0..source.args.len().min(target.args.len()) {
                create_type_edge(
                    builder,
                    &source.args[i],
                    &target.args[i],
                    substitution,
                    variance,
                    label,
                    syntax,
                );
            }
        }
        (Ty::Fn { .. }, Ty::Fn { .. }) => {
            let sp = source.args.len() - 1;
            let tp = target.args.len() - 1;
            for i in 0..sp.min(tp) {
                create_type_edge(
                    builder,
                    &source.args[i],
                    &target.args[i],
                    substitution,
                    variance.flip(),
                    label,
                    syntax,
                );
            }
            create_type_edge(
                builder,
                &source.args[sp],
                &target.args[tp],
                substitution,
                variance,
                label,
                syntax,
            );
        }
        _ => {}
    }
}

/// View `source` as an instantiation of `target_def` through its declared
/// bases. The mapped tree reuses the source's outer node; type-parameter
/// positions pull the source's argument nodes, concrete base arguments fall
/// back to oblivious.
pub fn substitute_base(
    builder: &GraphBuilder<'_>,
    source: &TypeWithNode,
    target_def: crate::lang::DefId,
) -> Option<TypeWithNode> {
    let unit = builder.unit;
    let Ty::Named { def, .. } = &source.ty else {
        return None;
    };
    if *def == target_def {
        return Some(source.clone());
    }
    let base_args = unit.defs.base_instantiation(*def, target_def)?;
    let args: Vec<TypeWithNode> = base_args
        .iter()
        .map(|ty| project_type(ty, &source.args))
        .collect();
    let ty = Ty::Named {
        def: target_def,
        args: args.iter().map(|a| a.ty.clone()).collect(),
    };
    Some(TypeWithNode::new(ty, source.node, args))
}

fn project_type(ty: &Ty, class_args: &[TypeWithNode]) -> TypeWithNode {
    if let Ty::Param(TypeParamRef {
        owner: TypeParamOwner::Type,
        ordinal,
    }) = ty
        && (*ordinal as usize) < class_args.len()
    {
        return class_args[*ordinal as usize].clone();
    }
    let args: Vec<TypeWithNode> = ty
        .children()
        .into_iter()
        .map(|child| project_type(child, class_args))
        .collect();
    let ty = ty.with_children(args.iter().map(|a| a.ty.clone()).collect());
    TypeWithNode::new(ty, NodeId::OBLIVIOUS, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_composition_table() {
        use DeclaredVariance::*;
        assert_eq!(Variance::Out.compose(Out), Variance::Out);
        assert_eq!(Variance::Out.compose(In), Variance::In);
        assert_eq!(Variance::Out.compose(Invariant), Variance::Invariant);
        assert_eq!(Variance::In.compose(Out), Variance::In);
        assert_eq!(Variance::In.compose(In), Variance::Out);
        assert_eq!(Variance::Invariant.compose(Out), Variance::Invariant);
        assert_eq!(Variance::Invariant.compose(In), Variance::Invariant);
    }

    #[test]
    fn identity_arguments_fall_through() {
        let param = TypeParamRef {
            owner: TypeParamOwner::Type,
            ordinal: 0,
        };
        let subst = TypeSubstitution::for_class(vec![TypeWithNode::leaf(
            Ty::Param(param),
            NodeId::OBLIVIOUS,
        )]);
        assert!(subst.lookup(param).is_none());

        let concrete = TypeSubstitution::for_class(vec![TypeWithNode::leaf(
            Ty::Param(param),
            NodeId::NULLABLE,
        )]);
        assert!(concrete.lookup(param).is_some());
    }
}
