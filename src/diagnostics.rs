//! Diagnostic infrastructure.
//!
//! Inference never fails on bad nullability; it reports. Warnings cover
//! degraded symbol resolution, errors cover contradictions where a node is
//! forced both nullable and non-null.

use crate::lang::SyntaxId;
use serde::Serialize;
use std::fmt;

/// The severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A source location: a tree index paired with a syntax occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SourceSpan {
    pub tree: u32,
    pub syntax: SyntaxId,
}

impl SourceSpan {
    pub const NONE: SourceSpan = SourceSpan {
        tree: u32::MAX,
        syntax: SyntaxId::NONE,
    };

    pub fn new(tree: u32, syntax: SyntaxId) -> Self {
        SourceSpan { tree, syntax }
    }

    pub fn is_none(&self) -> bool {
        self.tree == u32::MAX
    }
}

/// A single diagnostic message with location and severity.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: SourceSpan,
    /// Further locations involved, e.g. the edge chain of a contradiction.
    pub related: Vec<SourceSpan>,
}

impl Diagnostic {
    pub fn warning(span: SourceSpan, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            span,
            related: Vec::new(),
        }
    }

    pub fn error(span: SourceSpan, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span,
            related: Vec::new(),
        }
    }

    pub fn with_related(mut self, related: Vec<SourceSpan>) -> Self {
        self.related = related;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.span.is_none() {
            write!(f, "{}: {}", self.severity.name(), self.message)
        } else {
            write!(
                f,
                "{}: {} (tree {}, syntax {})",
                self.severity.name(),
                self.message,
                self.span.tree,
                self.span.syntax.0
            )
        }
    }
}
