//! Process-scoped dedup configuration, loaded fresh as an immutable
//! snapshot at the start of every analysis run (Stage 1).

use scoring::ScoreWeights;

/// Bind-variable chunk size used when batch-loading scoring metadata —
/// kept conservative relative to common embedded-store limits.
pub const SCORING_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// MinHash signature length (default 128; recommended 192).
    pub num_permutations: usize,
    /// LSH band count; must divide `num_permutations`.
    pub num_bands: usize,
    /// Shingle window width in tokens.
    pub ngram_size: usize,
    /// Minimum token count for a document to be shingled at all.
    pub min_words: usize,
    /// Final cutoff for group membership.
    pub similarity_threshold: f64,
    pub weights: ScoreWeights,
    /// Cap, in characters, on text submitted to the fuzzy ratio.
    pub fuzzy_sample_size: usize,
    /// Whether analysis is triggered automatically after a successful sync.
    pub auto_analyze: bool,
    /// Opaque version tag; bumping it is treated as invalidating reuse of
    /// signatures built under a previous value (callers choosing to force a
    /// regeneration typically bump this alongside `force: true`).
    pub algorithm_version: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            num_permutations: minhash::DEFAULT_NUM_PERMUTATIONS,
            // `lsh::DEFAULT_NUM_BANDS` (20) does not evenly divide the
            // default signature length (128); 16 is the nearest divisor,
            // see the Open Questions note in DESIGN.md.
            num_bands: 16,
            ngram_size: textnorm::DEFAULT_NGRAM_SIZE,
            min_words: 20,
            similarity_threshold: 0.72,
            weights: ScoreWeights::default(),
            fuzzy_sample_size: 4000,
            auto_analyze: false,
            algorithm_version: "dupehound-v1".to_string(),
        }
    }
}

/// Options for a single [`crate::AnalysisOrchestrator::run`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    /// Re-examine every document (not just `processing_status = pending`)
    /// and every existing signature/candidate, per §4.8 Stage 2/5.
    pub force: bool,
}
