//! Configuration for an inference run.

/// Options controlling graph construction and solving.
#[derive(Clone, Debug)]
pub struct InferenceOptions {
    /// Build per-tree graphs on the rayon pool instead of serially. The
    /// result is identical either way; commits are ordered by tree path.
    pub parallel: bool,
    /// Cap on the number of contradiction diagnostics that carry a full
    /// edge-chain reconstruction; further contradictions are summarized.
    pub max_contradiction_paths: usize,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        InferenceOptions {
            parallel: true,
            max_contradiction_paths: 16,
        }
    }
}
