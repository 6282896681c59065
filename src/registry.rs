//! The type system registry.
//!
//! Owns the flow graph and the canonical `symbol → TypeWithNode` map.
//! Builders never touch it directly: they buffer node allocations, edges,
//! symbol registrations and syntax mappings into a [`TreeCommit`], and a
//! single committer applies commits serially in [`TypeSystem::flush`].
//! Pending node ids are remapped to arena ids at that point, so a flush is
//! atomic per builder and the graph is deterministic for any thread
//! interleaving.

use crate::builder::BuildError;
use crate::diagnostics::{Diagnostic, SourceSpan};
use crate::graph::{NodeId, NullabilityGraph, NullabilityNode};
use crate::lang::{
    CompilationUnit, DeclaredType, DefTable, NullableAnnotation, Symbol, SymbolArena, SymbolId,
    SymbolKind, SyntaxId, Ty,
};
use crate::parallel::CancelToken;
use crate::type_node::TypeWithNode;
use rustc_hash::FxHashMap;
use tracing::debug;

/// An edge recorded by a builder, not yet remapped into the arena.
pub struct PendingEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub label: &'static str,
    pub span: SourceSpan,
}

/// Everything one builder produced for one tree, applied atomically.
pub struct TreeCommit {
    pub tree: u32,
    pub path: String,
    pub nodes: Vec<NullabilityNode>,
    pub edges: Vec<PendingEdge>,
    pub symbol_types: Vec<(SymbolId, TypeWithNode)>,
    pub mapping: Vec<(SyntaxId, NodeId)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The central registry: graph, symbol types, per-tree syntax mappings.
#[derive(Debug)]
pub struct TypeSystem {
    pub graph: NullabilityGraph,
    symbol_types: FxHashMap<SymbolId, TypeWithNode>,
    mappings: Vec<FxHashMap<SyntaxId, NodeId>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TypeSystem {
    pub fn new(tree_count: usize) -> Self {
        TypeSystem {
            graph: NullabilityGraph::new(),
            symbol_types: FxHashMap::default(),
            mappings: vec![FxHashMap::default(); tree_count],
            diagnostics: Vec::new(),
        }
    }

    /// The special node a declared annotation pins a reference position to.
    pub fn special_node(annotation: NullableAnnotation) -> NodeId {
        match annotation {
            NullableAnnotation::Annotated => NodeId::NULLABLE,
            NullableAnnotation::NotAnnotated => NodeId::NON_NULL,
            NullableAnnotation::None => NodeId::OBLIVIOUS,
        }
    }

    /// Construct a node tree for `ty` without allocating: every reference
    /// position gets the special node chosen by `annotation`, every value
    /// position the oblivious node.
    pub fn from_type(defs: &DefTable, ty: &Ty, annotation: NullableAnnotation) -> TypeWithNode {
        let node = if ty.is_reference(defs) {
            Self::special_node(annotation)
        } else {
            NodeId::OBLIVIOUS
        };
        let args = ty
            .children()
            .into_iter()
            .map(|child| Self::from_type(defs, child, annotation))
            .collect();
        TypeWithNode::new(ty.clone(), node, args)
    }

    /// The node tree registered for a source symbol, if any.
    pub fn registered(&self, id: SymbolId) -> Option<&TypeWithNode> {
        self.symbol_types.get(&id)
    }

    /// Materialize an external symbol's node tree from its declaration.
    ///
    /// A missing declared type is a resolution failure; it degrades to a
    /// single oblivious object node (the caller reports the warning).
    pub fn external_symbol_type(defs: &DefTable, symbol: &Symbol) -> TypeWithNode {
        match symbol.declared_type() {
            Some(DeclaredType::External { ty: Some(ty), annotation }) => {
                Self::from_type(defs, ty, *annotation)
            }
            Some(DeclaredType::External { ty: None, .. }) | None => {
                TypeWithNode::leaf(Ty::named(defs.builtins.object), NodeId::OBLIVIOUS)
            }
            Some(DeclaredType::Syntax(_)) => {
                panic!(
                    "external symbol `{}` carries source syntax",
                    symbol.name
                )
            }
        }
    }

    /// The canonical node tree for a symbol.
    ///
    /// Accessor parameters alias through [`resolve_symbol_alias`]; symbols
    /// of the current source module must already be registered: querying an
    /// unregistered one is a programming error. External symbols are
    /// materialized from their declared annotation.
    pub fn symbol_type(&self, unit: &CompilationUnit, id: SymbolId) -> TypeWithNode {
        let id = resolve_symbol_alias(&unit.symbols, id);
        let symbol = unit.symbols.get(id);
        if symbol.is_external {
            return Self::external_symbol_type(&unit.defs, symbol);
        }
        self.symbol_types.get(&id).cloned().unwrap_or_else(|| {
            panic!(
                "source {} `{}` was never registered by a declaration pass",
                symbol.kind.name(),
                symbol.name
            )
        })
    }

    /// The syntax-to-node mapping of one tree.
    pub fn mapping(&self, tree: u32) -> &FxHashMap<SyntaxId, NodeId> {
        &self.mappings[tree as usize]
    }

    pub fn tree_count(&self) -> usize {
        self.mappings.len()
    }

    /// Apply builder commits serially.
    ///
    /// Commits are ordered by a stable sort on tree path so the resulting
    /// graph does not depend on scheduling. The cancel token is checked at
    /// the start of each commit; a flushed commit is never partial.
    pub fn flush(
        &mut self,
        mut commits: Vec<TreeCommit>,
        cancel: &CancelToken,
    ) -> Result<(), BuildError> {
        commits.sort_by(|a, b| a.path.cmp(&b.path).then(a.tree.cmp(&b.tree)));
        for commit in commits {
            if cancel.is_canceled() {
                return Err(BuildError::Canceled);
            }
            self.apply(commit);
        }
        Ok(())
    }

    fn apply(&mut self, commit: TreeCommit) {
        let base = self.graph.nodes.len() as u32;
        debug!(
            tree = commit.tree,
            path = %commit.path,
            nodes = commit.nodes.len(),
            edges = commit.edges.len(),
            "flushing tree commit"
        );

        for node in commit.nodes {
            self.graph.nodes.alloc(node);
        }
        let remap = |id: NodeId| -> NodeId {
            if id.is_pending() {
                NodeId(base + id.pending_index() as u32)
            } else {
                id
            }
        };

        for edge in commit.edges {
            self.graph
                .add_edge(remap(edge.source), remap(edge.target), edge.label, edge.span);
        }
        for (symbol, twn) in commit.symbol_types {
            let twn = remap_type(&twn, &remap);
            let previous = self.symbol_types.insert(symbol, twn);
            debug_assert!(
                previous.is_none(),
                "symbol {:?} registered by more than one tree",
                symbol
            );
        }
        let mapping = &mut self.mappings[commit.tree as usize];
        for (syntax, node) in commit.mapping {
            mapping.insert(syntax, remap(node));
        }
        self.diagnostics.extend(commit.diagnostics);
    }
}

fn remap_type(twn: &TypeWithNode, remap: &impl Fn(NodeId) -> NodeId) -> TypeWithNode {
    TypeWithNode {
        ty: twn.ty.clone(),
        node: remap(twn.node),
        args: twn.args.iter().map(|a| remap_type(a, remap)).collect(),
    }
}

/// Resolve accessor aliasing to the symbol whose node tree is canonical.
///
/// - The implicit value parameter of a property setter (named `value`,
///   ordinal equal to the property's declared parameter count) aliases the
///   property itself.
/// - Indexer accessor parameters with ordinal below the indexer's parameter
///   count alias the corresponding indexer parameter.
/// - A getter method aliases its property (its "type" is the return type).
pub fn resolve_symbol_alias(symbols: &SymbolArena, id: SymbolId) -> SymbolId {
    let symbol = symbols.get(id);
    match &symbol.kind {
        SymbolKind::Parameter(param) if !param.method.is_none() => {
            let method = symbols.get(param.method);
            let SymbolKind::Method(m) = &method.kind else {
                return id;
            };
            let Some(property_id) = m.accessor_of else {
                return id;
            };
            let property = symbols.get(property_id).as_property();
            let ordinal = param.ordinal as usize;
            if m.is_setter && ordinal == property.params.len() {
                debug_assert_eq!(symbol.name, "value");
                return resolve_symbol_alias(symbols, property_id);
            }
            if ordinal < property.params.len() {
                return resolve_symbol_alias(symbols, property.params[ordinal]);
            }
            id
        }
        SymbolKind::Method(m) if m.accessor_of.is_some() && !m.is_setter => {
            resolve_symbol_alias(symbols, m.accessor_of.unwrap())
        }
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{DefId, MethodSymbol, ParameterSymbol, PropertySymbol, RefKind};

    fn external(name: &str, kind: SymbolKind) -> Symbol {
        Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container: DefId::NONE,
            is_static: false,
            is_external: true,
            kind,
        }
    }

    #[test]
    fn from_type_applies_the_annotation_uniformly() {
        let defs = DefTable::new();
        let ty = Ty::named_with(
            defs.builtins.list,
            vec![Ty::named(defs.builtins.string)],
        );
        let twn = TypeSystem::from_type(&defs, &ty, NullableAnnotation::Annotated);
        assert_eq!(twn.node, NodeId::NULLABLE);
        assert_eq!(twn.args[0].node, NodeId::NULLABLE);

        let twn = TypeSystem::from_type(&defs, &ty, NullableAnnotation::NotAnnotated);
        assert_eq!(twn.node, NodeId::NON_NULL);

        let value = Ty::named(defs.builtins.int32);
        let twn = TypeSystem::from_type(&defs, &value, NullableAnnotation::Annotated);
        assert_eq!(twn.node, NodeId::OBLIVIOUS);
    }

    #[test]
    fn missing_external_type_degrades_to_oblivious() {
        let defs = DefTable::new();
        let symbol = external(
            "Mystery",
            SymbolKind::Field(crate::lang::FieldSymbol {
                ty: DeclaredType::External { ty: None, annotation: NullableAnnotation::None },
            }),
        );
        let twn = TypeSystem::external_symbol_type(&defs, &symbol);
        assert_eq!(twn.node, NodeId::OBLIVIOUS);
    }

    #[test]
    fn setter_value_parameter_aliases_the_property() {
        let mut symbols = SymbolArena::new();
        let property = symbols.alloc(external(
            "Name",
            SymbolKind::Property(PropertySymbol {
                ty: DeclaredType::External {
                    ty: None,
                    annotation: NullableAnnotation::None,
                },
                params: Vec::new(),
            }),
        ));
        let setter = symbols.alloc(external(
            "set_Name",
            SymbolKind::Method(MethodSymbol {
                ret: DeclaredType::External { ty: None, annotation: NullableAnnotation::None },
                params: Vec::new(),
                type_params: Vec::new(),
                is_async: false,
                accessor_of: Some(property),
                is_setter: true,
            }),
        ));
        let value = symbols.alloc(external(
            "value",
            SymbolKind::Parameter(ParameterSymbol {
                ty: DeclaredType::External { ty: None, annotation: NullableAnnotation::None },
                ordinal: 0,
                ref_kind: RefKind::None,
                method: setter,
            }),
        ));
        assert_eq!(resolve_symbol_alias(&symbols, value), property);
    }

    #[test]
    fn indexer_accessor_parameter_aliases_the_indexer_parameter() {
        let mut symbols = SymbolArena::new();
        let index_param = symbols.alloc(external(
            "index",
            SymbolKind::Parameter(ParameterSymbol {
                ty: DeclaredType::External { ty: None, annotation: NullableAnnotation::None },
                ordinal: 0,
                ref_kind: RefKind::None,
                method: SymbolId::NONE,
            }),
        ));
        let indexer = symbols.alloc(external(
            "Item",
            SymbolKind::Property(PropertySymbol {
                ty: DeclaredType::External { ty: None, annotation: NullableAnnotation::None },
                params: vec![index_param],
            }),
        ));
        let getter = symbols.alloc(external(
            "get_Item",
            SymbolKind::Method(MethodSymbol {
                ret: DeclaredType::External { ty: None, annotation: NullableAnnotation::None },
                params: Vec::new(),
                type_params: Vec::new(),
                is_async: false,
                accessor_of: Some(indexer),
                is_setter: false,
            }),
        ));
        let accessor_param = symbols.alloc(external(
            "index",
            SymbolKind::Parameter(ParameterSymbol {
                ty: DeclaredType::External { ty: None, annotation: NullableAnnotation::None },
                ordinal: 0,
                ref_kind: RefKind::None,
                method: getter,
            }),
        ));
        assert_eq!(resolve_symbol_alias(&symbols, accessor_param), index_param);
        assert_eq!(resolve_symbol_alias(&symbols, getter), indexer);
    }

    #[test]
    fn flush_remaps_pending_ids_in_path_order() {
        use crate::graph::Nullability;
        let mut ts = TypeSystem::new(2);
        let cancel = CancelToken::new();

        let commit_b = TreeCommit {
            tree: 1,
            path: "b.src".to_string(),
            nodes: vec![NullabilityNode::new(Nullability::Inferred, Some("b".into()))],
            edges: vec![PendingEdge {
                source: NodeId::pending(0),
                target: NodeId::NON_NULL,
                label: "deref",
                span: SourceSpan::NONE,
            }],
            symbol_types: Vec::new(),
            mapping: vec![(SyntaxId(0), NodeId::pending(0))],
            diagnostics: Vec::new(),
        };
        let commit_a = TreeCommit {
            tree: 0,
            path: "a.src".to_string(),
            nodes: vec![NullabilityNode::new(Nullability::Inferred, Some("a".into()))],
            edges: Vec::new(),
            symbol_types: Vec::new(),
            mapping: vec![(SyntaxId(0), NodeId::pending(0))],
            diagnostics: Vec::new(),
        };
        // Submitted out of order; path order decides arena layout.
        ts.flush(vec![commit_b, commit_a], &cancel).unwrap();

        assert_eq!(ts.mapping(0)[&SyntaxId(0)], NodeId(3));
        assert_eq!(ts.mapping(1)[&SyntaxId(0)], NodeId(4));
        let (_, edge) = ts.graph.edges().next().unwrap();
        assert_eq!(edge.source, NodeId(4));
        assert_eq!(edge.target, NodeId::NON_NULL);
    }
}
