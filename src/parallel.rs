//! Parallel graph construction.
//!
//! Per-tree building is embarrassingly parallel: each pass fans the trees
//! out over the rayon pool, every builder touching only its local buffers,
//! and the resulting commits are applied serially by the single committer.
//! Commit order is a stable sort on tree path, so the graph is identical
//! regardless of thread interleaving. A cooperative cancel token is checked
//! before each tree visit and at the start of each commit.

use crate::builder::{BuildError, build_tree, declare_tree};
use crate::lang::CompilationUnit;
use crate::options::InferenceOptions;
use crate::registry::{TreeCommit, TypeSystem};
use crate::solver::{InferenceResult, assign_verdicts};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug_span;

/// Cooperative cancellation flag shared between the caller and the workers.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Statistics of one construction run.
#[derive(Clone, Debug, Default)]
pub struct BuildStats {
    pub trees: usize,
    pub nodes: usize,
    pub edges: usize,
}

impl BuildStats {
    pub fn of(types: &TypeSystem) -> Self {
        BuildStats {
            trees: types.tree_count(),
            nodes: types.graph.node_count(),
            edges: types.graph.edge_count(),
        }
    }
}

/// Build the full flow graph for a compilation unit.
///
/// Two passes, each fan-out-then-serial-merge: the declaration pass
/// registers node trees for every declared symbol, the edge pass walks the
/// bound operations.
pub fn build_graph(
    unit: &CompilationUnit,
    options: &InferenceOptions,
    cancel: &CancelToken,
) -> Result<TypeSystem, BuildError> {
    let mut types = TypeSystem::new(unit.trees.len());

    {
        let _span = debug_span!("declare_pass", trees = unit.trees.len()).entered();
        let commits = run_pass(unit, &types, options, cancel, declare_tree)?;
        types.flush(commits, cancel)?;
    }
    {
        let _span = debug_span!("edge_pass", trees = unit.trees.len()).entered();
        let commits = run_pass(unit, &types, options, cancel, build_tree)?;
        types.flush(commits, cancel)?;
    }

    Ok(types)
}

fn run_pass(
    unit: &CompilationUnit,
    types: &TypeSystem,
    options: &InferenceOptions,
    cancel: &CancelToken,
    pass: fn(&CompilationUnit, &TypeSystem, u32) -> Result<TreeCommit, BuildError>,
) -> Result<Vec<TreeCommit>, BuildError> {
    let indices: Vec<u32> = (0..unit.trees.len() as u32).collect();
    let run = |&index: &u32| -> Result<TreeCommit, BuildError> {
        if cancel.is_canceled() {
            return Err(BuildError::Canceled);
        }
        pass(unit, types, index)
    };
    if options.parallel {
        indices.par_iter().map(run).collect()
    } else {
        indices.iter().map(run).collect()
    }
}

/// Convenience entry point: build, solve, assign verdicts.
pub fn infer(
    unit: &CompilationUnit,
    options: &InferenceOptions,
    cancel: &CancelToken,
) -> Result<InferenceResult, BuildError> {
    let types = build_graph(unit, options, cancel)?;
    Ok(assign_verdicts(&types, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_aborts_before_work_starts() {
        let mut unit = CompilationUnit::new();
        unit.trees.push(crate::lang::BoundTree::new("a.src"));
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = build_graph(&unit, &InferenceOptions::default(), &cancel);
        assert!(matches!(result, Err(BuildError::Canceled)));
    }

    #[test]
    fn empty_unit_builds_an_empty_graph() {
        let unit = CompilationUnit::new();
        let types = build_graph(&unit, &InferenceOptions::default(), &CancelToken::new()).unwrap();
        let stats = BuildStats::of(&types);
        assert_eq!(stats.trees, 0);
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 0);
    }
}
