//! Named type definitions.
//!
//! A [`DefTable`] holds one [`TypeDef`] per named type the bound trees refer
//! to. The core library types the engine must recognize (task-like wrappers,
//! sequence interfaces, `Nullable<T>`) are seeded up front and looked up by
//! fully qualified name.

use crate::lang::types::Ty;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Unique identifier for a named type definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DefId(pub u32);

impl DefId {
    pub const NONE: DefId = DefId(u32::MAX);

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// The kind of a named type definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TypeDefKind {
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
}

/// Variance declared on a type parameter (`out T` / `in T` / plain `T`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum DeclaredVariance {
    #[default]
    Invariant,
    /// Covariant (`out`).
    Out,
    /// Contravariant (`in`).
    In,
}

/// A type parameter declared on a type or method.
#[derive(Clone, Debug, Serialize)]
pub struct TypeParamDecl {
    pub name: String,
    pub variance: DeclaredVariance,
}

impl TypeParamDecl {
    pub fn invariant(name: &str) -> Self {
        TypeParamDecl {
            name: name.to_string(),
            variance: DeclaredVariance::Invariant,
        }
    }

    pub fn covariant(name: &str) -> Self {
        TypeParamDecl {
            name: name.to_string(),
            variance: DeclaredVariance::Out,
        }
    }

    pub fn contravariant(name: &str) -> Self {
        TypeParamDecl {
            name: name.to_string(),
            variance: DeclaredVariance::In,
        }
    }
}

/// A named type definition.
#[derive(Clone, Debug, Serialize)]
pub struct TypeDef {
    pub id: DefId,
    /// Short name, e.g. `List`.
    pub name: String,
    /// Fully qualified metadata name, e.g. `System.Collections.Generic.List`1`.
    pub qualified_name: String,
    pub kind: TypeDefKind,
    pub type_params: Vec<TypeParamDecl>,
    /// Base class and implemented interfaces, written in terms of this
    /// definition's own type parameters.
    pub bases: Vec<Ty>,
}

impl TypeDef {
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeDefKind::Struct | TypeDefKind::Enum)
    }

    pub fn arity(&self) -> usize {
        self.type_params.len()
    }
}

/// Definitions the engine recognizes by fully qualified name.
#[derive(Clone, Copy, Debug)]
pub struct BuiltinDefs {
    pub object: DefId,
    pub string: DefId,
    pub boolean: DefId,
    pub int32: DefId,
    pub void: DefId,
    pub type_info: DefId,
    pub exception: DefId,
    pub nullable: DefId,
    pub sequence: DefId,
    pub iterator: DefId,
    pub task: DefId,
    pub value_task: DefId,
    pub list: DefId,
}

/// All named type definitions for one compilation.
pub struct DefTable {
    defs: Vec<TypeDef>,
    by_qualified: FxHashMap<String, DefId>,
    pub builtins: BuiltinDefs,
}

impl DefTable {
    /// Create a table seeded with the core library definitions.
    pub fn new() -> Self {
        let mut table = DefTable {
            defs: Vec::new(),
            by_qualified: FxHashMap::default(),
            builtins: BuiltinDefs {
                object: DefId::NONE,
                string: DefId::NONE,
                boolean: DefId::NONE,
                int32: DefId::NONE,
                void: DefId::NONE,
                type_info: DefId::NONE,
                exception: DefId::NONE,
                nullable: DefId::NONE,
                sequence: DefId::NONE,
                iterator: DefId::NONE,
                task: DefId::NONE,
                value_task: DefId::NONE,
                list: DefId::NONE,
            },
        };

        let object = table.add("Object", "System.Object", TypeDefKind::Class, Vec::new(), Vec::new());
        table.builtins.object = object;
        table.builtins.string = table.add(
            "String",
            "System.String",
            TypeDefKind::Class,
            Vec::new(),
            vec![Ty::named(object)],
        );
        table.builtins.boolean = table.add(
            "Boolean",
            "System.Boolean",
            TypeDefKind::Struct,
            Vec::new(),
            Vec::new(),
        );
        table.builtins.int32 = table.add(
            "Int32",
            "System.Int32",
            TypeDefKind::Struct,
            Vec::new(),
            Vec::new(),
        );
        table.builtins.void = table.add("Void", "System.Void", TypeDefKind::Struct, Vec::new(), Vec::new());
        table.builtins.type_info = table.add(
            "Type",
            "System.Type",
            TypeDefKind::Class,
            Vec::new(),
            vec![Ty::named(object)],
        );
        table.builtins.exception = table.add(
            "Exception",
            "System.Exception",
            TypeDefKind::Class,
            Vec::new(),
            vec![Ty::named(object)],
        );
        table.builtins.nullable = table.add(
            "Nullable",
            "System.Nullable`1",
            TypeDefKind::Struct,
            vec![TypeParamDecl::invariant("T")],
            Vec::new(),
        );
        let sequence = table.add(
            "IEnumerable",
            "System.Collections.Generic.IEnumerable`1",
            TypeDefKind::Interface,
            vec![TypeParamDecl::covariant("T")],
            Vec::new(),
        );
        table.builtins.sequence = sequence;
        table.builtins.iterator = table.add(
            "IEnumerator",
            "System.Collections.Generic.IEnumerator`1",
            TypeDefKind::Interface,
            vec![TypeParamDecl::covariant("T")],
            Vec::new(),
        );
        table.builtins.task = table.add(
            "Task",
            "System.Threading.Tasks.Task`1",
            TypeDefKind::Class,
            vec![TypeParamDecl::invariant("TResult")],
            vec![Ty::named(object)],
        );
        table.builtins.value_task = table.add(
            "ValueTask",
            "System.Threading.Tasks.ValueTask`1",
            TypeDefKind::Struct,
            vec![TypeParamDecl::invariant("TResult")],
            Vec::new(),
        );
        table.builtins.list = table.add(
            "List",
            "System.Collections.Generic.List`1",
            TypeDefKind::Class,
            vec![TypeParamDecl::invariant("T")],
            vec![
                Ty::named(object),
                Ty::named_with(sequence, vec![Ty::class_param(0)]),
            ],
        );

        table
    }

    /// Register a definition and return its id.
    pub fn add(
        &mut self,
        name: &str,
        qualified_name: &str,
        kind: TypeDefKind,
        type_params: Vec<TypeParamDecl>,
        bases: Vec<Ty>,
    ) -> DefId {
        let id = DefId(self.defs.len() as u32);
        self.defs.push(TypeDef {
            id,
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            kind,
            type_params,
            bases,
        });
        self.by_qualified.insert(qualified_name.to_string(), id);
        id
    }

    pub fn get(&self, id: DefId) -> &TypeDef {
        &self.defs[id.0 as usize]
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<DefId> {
        self.by_qualified.get(qualified_name).copied()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Task-like wrappers are transparent for nullability of their payload.
    pub fn is_task_like(&self, id: DefId) -> bool {
        id == self.builtins.task || id == self.builtins.value_task
    }

    /// Sequence-shaped types whose single argument is the iteration element.
    pub fn is_sequence_like(&self, id: DefId) -> bool {
        id == self.builtins.sequence || id == self.builtins.iterator
    }

    /// Find how `def` instantiates `target` through its declared bases.
    ///
    /// The returned arguments are written in terms of `def`'s own type
    /// parameters. Returns the identity instantiation when `def == target`.
    pub fn base_instantiation(&self, def: DefId, target: DefId) -> Option<Vec<Ty>> {
        if def == target {
            return Some(
                (0..self.get(def).arity())
                    .map(|i| Ty::class_param(i as u32))
                    .collect(),
            );
        }
        for base in &self.get(def).bases {
            let Ty::Named { def: base_def, args: base_args } = base else {
                continue;
            };
            if *base_def == target {
                return Some(base_args.clone());
            }
            if let Some(inner) = self.base_instantiation(*base_def, target) {
                // `inner` is written in terms of the base's parameters;
                // rewrite it in terms of `def`'s parameters.
                return Some(
                    inner
                        .iter()
                        .map(|ty| ty.substitute_class_params(base_args))
                        .collect(),
                );
            }
        }
        None
    }
}

impl Default for DefTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve_by_qualified_name() {
        let defs = DefTable::new();
        assert_eq!(defs.lookup("System.String"), Some(defs.builtins.string));
        assert_eq!(
            defs.lookup("System.Threading.Tasks.Task`1"),
            Some(defs.builtins.task)
        );
        assert!(defs.is_task_like(defs.builtins.value_task));
        assert!(!defs.is_task_like(defs.builtins.list));
    }

    #[test]
    fn list_instantiates_sequence_through_bases() {
        let defs = DefTable::new();
        let args = defs
            .base_instantiation(defs.builtins.list, defs.builtins.sequence)
            .expect("List implements the sequence interface");
        assert_eq!(args, vec![Ty::class_param(0)]);
    }

    #[test]
    fn derived_class_carries_substituted_base_arguments() {
        let mut defs = DefTable::new();
        let string = defs.builtins.string;
        let list = defs.builtins.list;
        let string_list = defs.add(
            "StringList",
            "Demo.StringList",
            TypeDefKind::Class,
            Vec::new(),
            vec![Ty::named_with(list, vec![Ty::named(string)])],
        );
        let args = defs
            .base_instantiation(string_list, defs.builtins.sequence)
            .expect("inherits the sequence interface via List");
        assert_eq!(args, vec![Ty::named(string)]);
    }
}
