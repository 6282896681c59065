//! Source-language model supplied by the binder collaborator.
//!
//! The inference engine does not parse or bind source text itself. A compiler
//! front-end hands it a [`CompilationUnit`]: a table of type definitions, an
//! arena of resolved symbols, and one bound operation tree per source file.
//! Everything in this module is input contract; the engine never mutates it.

pub mod defs;
pub mod ir;
pub mod symbols;
pub mod types;

use serde::Serialize;

pub use defs::{DefId, DefTable, DeclaredVariance, TypeDef, TypeDefKind, TypeParamDecl};
pub use ir::{
    AnonymousMember, Argument, BinaryOperator, BoundTree, ConversionKind, Initializer,
    InstanceKind, MemberBody, OpId, Operation, Pattern, PropertyClause, SwitchArm,
};
pub use symbols::{
    DeclaredType, EventSymbol, FieldSymbol, LocalSymbol, MethodSymbol, NullableAnnotation,
    ParameterSymbol, PropertySymbol, RefKind, Symbol, SymbolArena, SymbolId, SymbolKind,
};
pub use types::{TupleElementSyntax, Ty, TypeParamOwner, TypeParamRef, TypeSyntax};

/// Identifies one syntactic occurrence within a bound tree.
///
/// The front-end allocates these densely per tree; the engine uses them to
/// key the syntax-to-node mapping, to anchor edge provenance, and to consult
/// the non-null-flow oracle. Equality is only meaningful within one tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SyntaxId(pub u32);

impl SyntaxId {
    pub const NONE: SyntaxId = SyntaxId(u32::MAX);

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Everything the binder collaborator provides for one compilation.
pub struct CompilationUnit {
    /// Named type definitions, including the built-in core types.
    pub defs: DefTable,
    /// All symbols referenced from the bound trees.
    pub symbols: SymbolArena,
    /// One bound tree per source file.
    pub trees: Vec<BoundTree>,
}

impl CompilationUnit {
    pub fn new() -> Self {
        CompilationUnit {
            defs: DefTable::new(),
            symbols: SymbolArena::new(),
            trees: Vec::new(),
        }
    }
}

impl Default for CompilationUnit {
    fn default() -> Self {
        Self::new()
    }
}
