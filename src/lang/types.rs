//! Semantic and syntactic types.
//!
//! [`Ty`] is the resolved, annotation-free type of an expression or symbol.
//! [`TypeSyntax`] is one written occurrence of a type in source, carrying the
//! `?` annotations and the [`SyntaxId`]s the inference output is keyed by.

use crate::lang::SyntaxId;
use crate::lang::defs::{DefId, DefTable};
use serde::Serialize;

/// Which declaration a type parameter belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TypeParamOwner {
    /// Declared on the enclosing named type.
    Type,
    /// Declared on the enclosing method.
    Method,
}

/// A reference to a type parameter, resolved to its declaration slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TypeParamRef {
    pub owner: TypeParamOwner,
    pub ordinal: u32,
}

/// A resolved source-language type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Ty {
    /// A named type, possibly instantiated: `String`, `List<T>`.
    Named { def: DefId, args: Vec<Ty> },
    /// A single-dimensional array: `T[]`. Nested arrays model jagged shapes.
    Array(Box<Ty>),
    /// A value tuple: `(T, U)`.
    Tuple(Vec<Ty>),
    /// An occurrence of a type parameter.
    Param(TypeParamRef),
    /// A function-shaped (delegate) type.
    Fn { params: Vec<Ty>, ret: Box<Ty> },
}

impl Ty {
    pub fn named(def: DefId) -> Ty {
        Ty::Named { def, args: Vec::new() }
    }

    pub fn named_with(def: DefId, args: Vec<Ty>) -> Ty {
        Ty::Named { def, args }
    }

    /// Shorthand for a reference to the enclosing type's parameter `ordinal`.
    pub fn class_param(ordinal: u32) -> Ty {
        Ty::Param(TypeParamRef {
            owner: TypeParamOwner::Type,
            ordinal,
        })
    }

    /// Shorthand for a reference to the enclosing method's parameter `ordinal`.
    pub fn method_param(ordinal: u32) -> Ty {
        Ty::Param(TypeParamRef {
            owner: TypeParamOwner::Method,
            ordinal,
        })
    }

    /// Whether values of this type live on the heap and can be null.
    ///
    /// Type parameters count as reference-like: they can be instantiated with
    /// reference types, so their positions carry nullability nodes.
    pub fn is_reference(&self, defs: &DefTable) -> bool {
        match self {
            Ty::Named { def, .. } => !defs.get(*def).is_value_type(),
            Ty::Array(_) => true,
            Ty::Tuple(_) => false,
            Ty::Param(_) => true,
            Ty::Fn { .. } => true,
        }
    }

    /// The number of child positions a node tree for this type has.
    pub fn child_count(&self) -> usize {
        match self {
            Ty::Named { args, .. } => args.len(),
            Ty::Array(_) => 1,
            Ty::Tuple(elems) => elems.len(),
            Ty::Param(_) => 0,
            Ty::Fn { params, .. } => params.len() + 1,
        }
    }

    /// The child types, in the order their nodes are stored.
    pub fn children(&self) -> Vec<&Ty> {
        match self {
            Ty::Named { args, .. } => args.iter().collect(),
            Ty::Array(elem) => vec![elem],
            Ty::Tuple(elems) => elems.iter().collect(),
            Ty::Param(_) => Vec::new(),
            Ty::Fn { params, ret } => {
                let mut out: Vec<&Ty> = params.iter().collect();
                out.push(ret);
                out
            }
        }
    }

    /// Rebuild this type with the given child types, preserving shape.
    pub fn with_children(&self, children: Vec<Ty>) -> Ty {
        debug_assert_eq!(children.len(), self.child_count());
        match self {
            Ty::Named { def, .. } => Ty::Named { def: *def, args: children },
            Ty::Array(_) => Ty::Array(Box::new(children.into_iter().next().unwrap())),
            Ty::Tuple(_) => Ty::Tuple(children),
            Ty::Param(r) => Ty::Param(*r),
            Ty::Fn { .. } => {
                let mut children = children;
                let ret = children.pop().unwrap();
                Ty::Fn {
                    params: children,
                    ret: Box::new(ret),
                }
            }
        }
    }

    /// Replace references to the enclosing type's parameters with `args`.
    ///
    /// Used to rewrite base-interface instantiations into a derived type's
    /// own parameter space. Method parameters pass through untouched.
    pub fn substitute_class_params(&self, args: &[Ty]) -> Ty {
        match self {
            Ty::Param(TypeParamRef {
                owner: TypeParamOwner::Type,
                ordinal,
            }) if (*ordinal as usize) < args.len() => args[*ordinal as usize].clone(),
            Ty::Param(_) => self.clone(),
            other => {
                let children = other
                    .children()
                    .into_iter()
                    .map(|c| c.substitute_class_params(args))
                    .collect();
                other.with_children(children)
            }
        }
    }

    /// A short human-readable rendering for node debug names.
    pub fn display(&self, defs: &DefTable) -> String {
        match self {
            Ty::Named { def, args } if args.is_empty() => defs.get(*def).name.clone(),
            Ty::Named { def, args } => {
                let inner: Vec<String> = args.iter().map(|a| a.display(defs)).collect();
                format!("{}<{}>", defs.get(*def).name, inner.join(", "))
            }
            Ty::Array(elem) => format!("{}[]", elem.display(defs)),
            Ty::Tuple(elems) => {
                let inner: Vec<String> = elems.iter().map(|e| e.display(defs)).collect();
                format!("({})", inner.join(", "))
            }
            Ty::Param(r) => match r.owner {
                TypeParamOwner::Type => format!("!{}", r.ordinal),
                TypeParamOwner::Method => format!("!!{}", r.ordinal),
            },
            Ty::Fn { params, ret } => {
                let inner: Vec<String> = params.iter().map(|p| p.display(defs)).collect();
                format!("({}) -> {}", inner.join(", "), ret.display(defs))
            }
        }
    }
}

/// One element of a tuple type's syntax, optionally named.
///
/// Named members alias their positional child; the name does not get a node
/// of its own.
#[derive(Clone, Debug, Serialize)]
pub struct TupleElementSyntax {
    pub name: Option<String>,
    pub ty: TypeSyntax,
}

/// One written occurrence of a type.
///
/// `nullable` records a trailing `?` in source. On reference types it pins
/// the position to the nullable singleton; on value types it denotes the
/// `Nullable<T>` wrapper.
#[derive(Clone, Debug, Serialize)]
pub enum TypeSyntax {
    Named {
        id: SyntaxId,
        def: DefId,
        args: Vec<TypeSyntax>,
        nullable: bool,
    },
    Array {
        id: SyntaxId,
        elem: Box<TypeSyntax>,
        nullable: bool,
    },
    Tuple {
        id: SyntaxId,
        elems: Vec<TupleElementSyntax>,
    },
    Param {
        id: SyntaxId,
        param: TypeParamRef,
        nullable: bool,
    },
    Fn {
        id: SyntaxId,
        params: Vec<TypeSyntax>,
        ret: Box<TypeSyntax>,
    },
    /// An implicitly typed position (`var`); adopts the initializer's type.
    Implicit { id: SyntaxId },
}

impl TypeSyntax {
    pub fn id(&self) -> SyntaxId {
        match self {
            TypeSyntax::Named { id, .. }
            | TypeSyntax::Array { id, .. }
            | TypeSyntax::Tuple { id, .. }
            | TypeSyntax::Param { id, .. }
            | TypeSyntax::Fn { id, .. }
            | TypeSyntax::Implicit { id } => *id,
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, TypeSyntax::Implicit { .. })
    }

    /// The resolved type this syntax denotes.
    ///
    /// `T?` over a value type resolves to the `Nullable<T>` instantiation.
    /// Implicitly typed syntax has no resolved type of its own; asking for
    /// one is a programming error.
    pub fn ty(&self, defs: &DefTable) -> Ty {
        match self {
            TypeSyntax::Named { def, args, nullable, .. } => {
                let inner = Ty::Named {
                    def: *def,
                    args: args.iter().map(|a| a.ty(defs)).collect(),
                };
                if *nullable && defs.get(*def).is_value_type() {
                    Ty::named_with(defs.builtins.nullable, vec![inner])
                } else {
                    inner
                }
            }
            TypeSyntax::Array { elem, .. } => Ty::Array(Box::new(elem.ty(defs))),
            TypeSyntax::Tuple { elems, .. } => {
                Ty::Tuple(elems.iter().map(|e| e.ty.ty(defs)).collect())
            }
            TypeSyntax::Param { param, .. } => Ty::Param(*param),
            TypeSyntax::Fn { params, ret, .. } => Ty::Fn {
                params: params.iter().map(|p| p.ty(defs)).collect(),
                ret: Box::new(ret.ty(defs)),
            },
            TypeSyntax::Implicit { .. } => {
                panic!("implicitly typed syntax does not denote a type by itself")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_value_syntax_wraps_in_nullable() {
        let defs = DefTable::new();
        let syntax = TypeSyntax::Named {
            id: SyntaxId(0),
            def: defs.builtins.int32,
            args: Vec::new(),
            nullable: true,
        };
        let ty = syntax.ty(&defs);
        assert_eq!(
            ty,
            Ty::named_with(defs.builtins.nullable, vec![Ty::named(defs.builtins.int32)])
        );
        assert!(!ty.is_reference(&defs));
    }

    #[test]
    fn nullable_reference_syntax_keeps_the_plain_type() {
        let defs = DefTable::new();
        let syntax = TypeSyntax::Named {
            id: SyntaxId(0),
            def: defs.builtins.string,
            args: Vec::new(),
            nullable: true,
        };
        assert_eq!(syntax.ty(&defs), Ty::named(defs.builtins.string));
    }

    #[test]
    fn with_children_round_trips_shape() {
        let defs = DefTable::new();
        let ty = Ty::named_with(
            defs.builtins.list,
            vec![Ty::Array(Box::new(Ty::named(defs.builtins.string)))],
        );
        let children: Vec<Ty> = ty.children().into_iter().cloned().collect();
        assert_eq!(ty.with_children(children), ty);
    }
}
