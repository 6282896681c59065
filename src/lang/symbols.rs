//! Symbols resolved by the binder collaborator.
//!
//! Mirrors the external symbol interface: kind, container, declared type and
//! nullable annotation, parameter ordinals and ref kinds, indexer parameters
//! on properties, accessor linkage for the implicit setter value parameter.

use crate::lang::defs::{DefId, TypeParamDecl};
use crate::lang::types::{Ty, TypeSyntax};
use serde::Serialize;

/// Unique identifier for a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub const NONE: SymbolId = SymbolId(u32::MAX);

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// The declared nullable annotation on an external symbol's type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NullableAnnotation {
    /// Declared `T?`.
    Annotated,
    /// Declared `T` inside an annotated context.
    NotAnnotated,
    /// No annotation information (oblivious).
    None,
}

/// Passing mode of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RefKind {
    None,
    In,
    Out,
    Ref,
    /// Variadic tail parameter; accepts each argument at the element type.
    Params,
}

/// How a symbol's type was declared.
pub enum DeclaredType {
    /// A source symbol: the written type syntax, visited to allocate nodes.
    Syntax(TypeSyntax),
    /// An external symbol: a resolved type plus its declared annotation.
    /// A missing type is a resolution failure and degrades to oblivious.
    External {
        ty: Option<Ty>,
        annotation: NullableAnnotation,
    },
}

pub struct MethodSymbol {
    pub ret: DeclaredType,
    pub params: Vec<SymbolId>,
    pub type_params: Vec<TypeParamDecl>,
    pub is_async: bool,
    /// The property this method is a get/set accessor of, if any.
    pub accessor_of: Option<SymbolId>,
    pub is_setter: bool,
}

pub struct ParameterSymbol {
    pub ty: DeclaredType,
    pub ordinal: u32,
    pub ref_kind: RefKind,
    /// The method or accessor this parameter belongs to.
    pub method: SymbolId,
}

pub struct PropertySymbol {
    pub ty: DeclaredType,
    /// Indexer parameters; empty for plain properties.
    pub params: Vec<SymbolId>,
}

pub struct FieldSymbol {
    pub ty: DeclaredType,
}

pub struct EventSymbol {
    pub ty: DeclaredType,
}

pub struct LocalSymbol {
    /// The written type, or [`TypeSyntax::Implicit`] for `var`.
    pub ty: TypeSyntax,
}

pub enum SymbolKind {
    Method(MethodSymbol),
    Parameter(ParameterSymbol),
    Property(PropertySymbol),
    Field(FieldSymbol),
    Event(EventSymbol),
    Local(LocalSymbol),
}

impl SymbolKind {
    pub fn name(&self) -> &'static str {
        match self {
            SymbolKind::Method(_) => "method",
            SymbolKind::Parameter(_) => "parameter",
            SymbolKind::Property(_) => "property",
            SymbolKind::Field(_) => "field",
            SymbolKind::Event(_) => "event",
            SymbolKind::Local(_) => "local",
        }
    }
}

pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    /// The type this member is declared on; `NONE` for locals and lambdas.
    pub container: DefId,
    pub is_static: bool,
    /// External symbols come from referenced libraries; their nullability is
    /// taken as declared and they are never registered by a builder.
    pub is_external: bool,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn as_method(&self) -> &MethodSymbol {
        match &self.kind {
            SymbolKind::Method(m) => m,
            other => panic!("symbol `{}` is a {}, not a method", self.name, other.name()),
        }
    }

    pub fn as_parameter(&self) -> &ParameterSymbol {
        match &self.kind {
            SymbolKind::Parameter(p) => p,
            other => panic!("symbol `{}` is a {}, not a parameter", self.name, other.name()),
        }
    }

    pub fn as_property(&self) -> &PropertySymbol {
        match &self.kind {
            SymbolKind::Property(p) => p,
            other => panic!("symbol `{}` is a {}, not a property", self.name, other.name()),
        }
    }

    /// The declared type of this symbol's value position.
    ///
    /// For methods that is the return type; locals are handled separately
    /// because implicit typing adopts the initializer.
    pub fn declared_type(&self) -> Option<&DeclaredType> {
        match &self.kind {
            SymbolKind::Method(m) => Some(&m.ret),
            SymbolKind::Parameter(p) => Some(&p.ty),
            SymbolKind::Property(p) => Some(&p.ty),
            SymbolKind::Field(f) => Some(&f.ty),
            SymbolKind::Event(e) => Some(&e.ty),
            SymbolKind::Local(_) => None,
        }
    }
}

/// Arena of all symbols in a compilation.
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        SymbolArena { symbols: Vec::new() }
    }

    /// Allocate a symbol; its `id` field is overwritten with the new id.
    pub fn alloc(&mut self, mut symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        symbol.id = id;
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

impl Default for SymbolArena {
    fn default() -> Self {
        Self::new()
    }
}
