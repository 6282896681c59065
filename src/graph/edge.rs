//! Flow edges.
//!
//! `source → target` means: if source is nullable, target must tolerate
//! nullable. Dereference constraints are edges into the non-null singleton.

use crate::diagnostics::SourceSpan;
use crate::graph::node::NodeId;
use serde::Serialize;

/// Index of an edge in the graph's edge list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeId(pub u32);

/// Provenance of an edge, for diagnostics and graph export.
pub type EdgeLabel = &'static str;

/// One directed assignability constraint.
#[derive(Clone, Debug, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub label: EdgeLabel,
    pub span: SourceSpan,
}
