/// Counts and timing for one [`crate::AnalysisOrchestrator::run`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub documents_total: u64,
    pub documents_analyzed: u64,
    pub signatures_generated: u64,
    pub signatures_reused: u64,
    pub candidate_pairs_found: u64,
    pub candidate_pairs_scored: u64,
    pub groups_created: u64,
    pub groups_updated: u64,
    pub groups_removed: u64,
    pub duration_ms: u64,
}
