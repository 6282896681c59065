//! Path queries over a bound compilation unit.
//!
//! These are the questions the test corpus asks of the engine: does any
//! parameter of the single declared method flow into its return type, is
//! the return forced nullable, is a parameter forced non-null.

use crate::lang::{CompilationUnit, SymbolId, SymbolKind};
use crate::options::InferenceOptions;
use crate::parallel::{CancelToken, build_graph};
use crate::registry::TypeSystem;
use crate::solver::has_path;
use anyhow::{Result, bail, ensure};

/// Expected outcomes for [`check_paths`]; `None` skips the assertion.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathExpectations {
    /// A path from the nullable singleton to the return type exists.
    pub return_nullable: Option<bool>,
    /// A path from some parameter to the return type exists.
    pub return_depends_on_input: Option<bool>,
    /// A path from some parameter to the non-null singleton exists.
    pub input_must_be_non_null: Option<bool>,
}

/// The actual outcomes of the three path queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathReport {
    pub return_nullable: bool,
    pub return_depends_on_input: bool,
    pub input_must_be_non_null: bool,
}

/// Build the unit's graph and answer the three path queries for its single
/// declared method.
pub fn path_report(unit: &CompilationUnit) -> Result<PathReport> {
    let types = build_graph(unit, &InferenceOptions::default(), &CancelToken::new())?;
    let method = single_method(unit)?;
    report_for(unit, &types, method)
}

/// True iff any parameter node of the single declared method has a directed
/// path to that method's return node.
pub fn has_path_from_parameter_to_return_type(unit: &CompilationUnit) -> Result<bool> {
    Ok(path_report(unit)?.return_depends_on_input)
}

/// Assert the given expectations against the unit's graph.
pub fn check_paths(unit: &CompilationUnit, expect: &PathExpectations) -> Result<()> {
    let report = path_report(unit)?;
    if let Some(want) = expect.return_nullable {
        ensure!(
            report.return_nullable == want,
            "return_nullable: expected {want}, found {}",
            report.return_nullable
        );
    }
    if let Some(want) = expect.return_depends_on_input {
        ensure!(
            report.return_depends_on_input == want,
            "return_depends_on_input: expected {want}, found {}",
            report.return_depends_on_input
        );
    }
    if let Some(want) = expect.input_must_be_non_null {
        ensure!(
            report.input_must_be_non_null == want,
            "input_must_be_non_null: expected {want}, found {}",
            report.input_must_be_non_null
        );
    }
    Ok(())
}

fn report_for(
    unit: &CompilationUnit,
    types: &TypeSystem,
    method: SymbolId,
) -> Result<PathReport> {
    use crate::graph::NodeId;
    let ret = types.symbol_type(unit, method);
    let m = unit.symbols.get(method).as_method();
    let mut depends = false;
    let mut non_null = false;
    for &param in &m.params {
        let node = types.symbol_type(unit, param).node;
        depends |= has_path(&types.graph, node, ret.node);
        non_null |= has_path(&types.graph, node, NodeId::NON_NULL);
    }
    Ok(PathReport {
        return_nullable: has_path(&types.graph, NodeId::NULLABLE, ret.node),
        return_depends_on_input: depends,
        input_must_be_non_null: non_null,
    })
}

fn single_method(unit: &CompilationUnit) -> Result<SymbolId> {
    let mut found = None;
    for tree in &unit.trees {
        for member in &tree.members {
            let symbol = unit.symbols.get(member.symbol);
            if matches!(symbol.kind, SymbolKind::Method(_)) {
                if found.is_some() {
                    bail!("path queries need exactly one declared method");
                }
                found = Some(member.symbol);
            }
        }
    }
    match found {
        Some(method) => Ok(method),
        None => bail!("no method body found in the compilation unit"),
    }
}
