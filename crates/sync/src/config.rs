//! Sync engine configuration.

/// Inputs for one [`crate::SyncEngine::run`] call.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Force a full walk of the upstream corpus even if a prior sync
    /// succeeded.
    pub force_full_sync: bool,
    /// Page size for the upstream document list endpoint.
    pub page_size: u32,
    /// Truncation length applied to a document's full text before it is
    /// persisted.
    pub max_ocr_length: usize,
    /// Bound on concurrent in-flight metadata fetches.
    pub metadata_concurrency: usize,
    /// Delete every locally mirrored document before walking the upstream
    /// corpus.
    pub purge_before_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            force_full_sync: false,
            page_size: 50,
            max_ocr_length: 50_000,
            metadata_concurrency: 10,
            purge_before_sync: false,
        }
    }
}

/// Whether this run walked the entire upstream corpus or only documents
/// modified since the last successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    Full,
    Incremental,
}
