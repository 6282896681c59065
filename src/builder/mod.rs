//! Per-tree graph builders.
//!
//! Graph construction is a two-pass traversal. The declaration pass visits
//! every symbol declared in a tree and allocates the node trees for their
//! written types; the edge pass walks the bound operations and emits
//! assignability and dereference constraints. Each pass runs one builder per
//! tree against its own buffers; the registry applies the buffered commits
//! serially (see [`crate::registry::TypeSystem::flush`]).

pub mod operations;
pub mod substitution;
pub mod syntax;

pub use operations::build_tree;
pub use substitution::{TypeSubstitution, Variance, create_assignment_edge, create_type_edge};
pub use syntax::visit_type_syntax;

use crate::diagnostics::{Diagnostic, SourceSpan};
use crate::graph::{NodeId, Nullability, NullabilityNode};
use crate::lang::{
    BoundTree, CompilationUnit, DeclaredType, SymbolId, SymbolKind, SyntaxId,
};
use crate::registry::{PendingEdge, TreeCommit, TypeSystem, resolve_symbol_alias};
use crate::type_node::TypeWithNode;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::warn;

/// Fatal failures of graph construction.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The bound tree contains an operation kind the builder does not
    /// implement; the whole tree is abandoned.
    #[error("unsupported operation kind `{kind}` in `{path}`")]
    UnsupportedOperation { kind: String, path: String },
    #[error("graph construction was canceled")]
    Canceled,
}

/// A per-tree builder accumulating deferred additions.
///
/// Nodes allocated here get pending ids; edges, symbol registrations and
/// syntax mappings reference them freely. Nothing is visible to other trees
/// until the commit is flushed.
pub struct GraphBuilder<'a> {
    pub unit: &'a CompilationUnit,
    pub types: &'a TypeSystem,
    pub tree_index: u32,
    pending_nodes: Vec<NullabilityNode>,
    pending_edges: Vec<PendingEdge>,
    symbol_types: FxHashMap<SymbolId, TypeWithNode>,
    symbol_order: Vec<SymbolId>,
    mapping: Vec<(SyntaxId, NodeId)>,
    diagnostics: Vec<Diagnostic>,
    warned_symbols: FxHashSet<SymbolId>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(unit: &'a CompilationUnit, types: &'a TypeSystem, tree_index: u32) -> Self {
        GraphBuilder {
            unit,
            types,
            tree_index,
            pending_nodes: Vec::new(),
            pending_edges: Vec::new(),
            symbol_types: FxHashMap::default(),
            symbol_order: Vec::new(),
            mapping: Vec::new(),
            diagnostics: Vec::new(),
            warned_symbols: FxHashSet::default(),
        }
    }

    pub fn tree(&self) -> &'a BoundTree {
        &self.unit.trees[self.tree_index as usize]
    }

    /// Allocate a fresh inferred node in the local buffer.
    pub fn fresh_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId::pending(self.pending_nodes.len());
        self.pending_nodes
            .push(NullabilityNode::new(Nullability::Inferred, Some(name.into())));
        id
    }

    /// Record an assignability edge. Self-edges carry no information and
    /// are dropped.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        label: &'static str,
        syntax: SyntaxId,
    ) {
        if source == target {
            return;
        }
        self.pending_edges.push(PendingEdge {
            source,
            target,
            label,
            span: SourceSpan::new(self.tree_index, syntax),
        });
    }

    pub fn record_mapping(&mut self, syntax: SyntaxId, node: NodeId) {
        self.mapping.push((syntax, node));
    }

    /// Register the canonical node tree for a symbol declared (or bound, for
    /// locals and lambda parameters) in this tree.
    pub fn add_symbol_type(&mut self, symbol: SymbolId, twn: TypeWithNode) {
        if self.symbol_types.insert(symbol, twn).is_none() {
            self.symbol_order.push(symbol);
        }
    }

    /// The canonical node tree for a symbol, local registrations first.
    ///
    /// Source symbols of other trees must already be committed; external
    /// symbols are materialized from their declared annotation, degrading to
    /// oblivious with a warning when the declared type failed to resolve.
    pub fn symbol_type(&mut self, symbol: SymbolId) -> TypeWithNode {
        let unit = self.unit;
        let symbol = resolve_symbol_alias(&unit.symbols, symbol);
        if let Some(twn) = self.symbol_types.get(&symbol) {
            return twn.clone();
        }
        if let Some(twn) = self.types.registered(symbol) {
            return twn.clone();
        }
        let record = unit.symbols.get(symbol);
        if record.is_external {
            if matches!(
                record.declared_type(),
                Some(DeclaredType::External { ty: None, .. }) | None
            ) && self.warned_symbols.insert(symbol)
            {
                warn!(symbol = %record.name, "external symbol has no declared type; treating as oblivious");
                self.diagnostics.push(Diagnostic::warning(
                    SourceSpan::NONE,
                    format!(
                        "could not resolve the declared type of `{}`; its nullability is oblivious",
                        record.name
                    ),
                ));
            }
            return TypeSystem::external_symbol_type(&unit.defs, record);
        }
        panic!(
            "source {} `{}` used before its declaration was registered",
            record.kind.name(),
            record.name
        )
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn into_commit(self) -> TreeCommit {
        let unit = self.unit;
        let tree = &unit.trees[self.tree_index as usize];
        let mut symbol_types = Vec::with_capacity(self.symbol_order.len());
        let mut map = self.symbol_types;
        for symbol in self.symbol_order {
            if let Some(twn) = map.remove(&symbol) {
                symbol_types.push((symbol, twn));
            }
        }
        TreeCommit {
            tree: self.tree_index,
            path: tree.path.clone(),
            nodes: self.pending_nodes,
            edges: self.pending_edges,
            symbol_types,
            mapping: self.mapping,
            diagnostics: self.diagnostics,
        }
    }
}

/// Declaration pass: allocate node trees for every symbol declared in the
/// tree and record their syntax mappings.
pub fn declare_tree(
    unit: &CompilationUnit,
    types: &TypeSystem,
    tree_index: u32,
) -> Result<TreeCommit, BuildError> {
    let mut builder = GraphBuilder::new(unit, types, tree_index);
    let tree = builder.tree();
    for &symbol in &tree.declares {
        declare_symbol(&mut builder, symbol);
    }
    Ok(builder.into_commit())
}

fn declare_symbol(builder: &mut GraphBuilder<'_>, symbol: SymbolId) {
    let unit = builder.unit;
    if resolve_symbol_alias(&unit.symbols, symbol) != symbol {
        // Accessor parameters and getters alias another symbol's nodes.
        return;
    }
    let record = unit.symbols.get(symbol);
    debug_assert!(
        !record.is_external,
        "external symbol `{}` declared in a source tree",
        record.name
    );

    match &record.kind {
        SymbolKind::Method(m) => {
            if let DeclaredType::Syntax(ret) = &m.ret
                && !ret.is_implicit()
            {
                let twn = visit_type_syntax(builder, ret);
                builder.add_symbol_type(symbol, twn);
            }
            for &param in &m.params {
                declare_symbol(builder, param);
            }
        }
        SymbolKind::Parameter(p) => {
            if let DeclaredType::Syntax(ty) = &p.ty
                && !ty.is_implicit()
            {
                let twn = visit_type_syntax(builder, ty);
                builder.add_symbol_type(symbol, twn);
            }
        }
        SymbolKind::Property(p) => {
            if let DeclaredType::Syntax(ty) = &p.ty {
                let twn = visit_type_syntax(builder, ty);
                builder.add_symbol_type(symbol, twn);
            }
            for &param in &p.params {
                declare_symbol(builder, param);
            }
        }
        SymbolKind::Field(f) => {
            if let DeclaredType::Syntax(ty) = &f.ty {
                let twn = visit_type_syntax(builder, ty);
                builder.add_symbol_type(symbol, twn);
            }
        }
        SymbolKind::Event(e) => {
            if let DeclaredType::Syntax(ty) = &e.ty {
                let twn = visit_type_syntax(builder, ty);
                builder.add_symbol_type(symbol, twn);
            }
        }
        // Locals are bound where they are declared, during the edge pass.
        SymbolKind::Local(_) => {}
    }
}
