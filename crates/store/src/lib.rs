//! Data model and relational persistence for the deduplication core.
//!
//! [`Store`] is the seam between the sync/analysis engines and whatever
//! backs them durably. [`memory::InMemoryStore`] is a `RwLock`-guarded
//! `HashMap`-based implementation used in tests and the demo binary;
//! [`sqlite::SqliteStore`] is the production backend, an embedded
//! single-file relational database reached through a pooled connection.

mod error;
mod memory;
pub mod model;
pub mod sqlite;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use model::{
    group_key, Document, DocumentContent, DocumentSignature, DuplicateGroup, DuplicateGroupMember,
    GroupWithMembers, ProcessingStatus, SyncState,
};
pub use sqlite::SqliteStore;

/// Persistence seam for documents, signatures, and duplicate groups.
///
/// Implementations must be `Send + Sync`: both the sync engine (bounded
/// concurrent metadata fetches) and the analysis orchestrator assume calls
/// may arrive from multiple worker tasks, serialized internally by the
/// implementation (an `RwLock`, a connection pool, or genuine
/// single-writer discipline).
pub trait Store: Send + Sync {
    /// Look up a document by its upstream numeric id (unique per §3).
    fn get_document_by_upstream_id(&self, upstream_id: i64) -> Result<Option<Document>, StoreError>;

    /// Look up a document by its local opaque id.
    fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError>;

    /// List every document, optionally restricted to `processing_status =
    /// pending`.
    fn list_documents(&self, only_pending: bool) -> Result<Vec<Document>, StoreError>;

    /// Insert a new document together with its content in one atomic
    /// write. Fails with [`StoreError::Constraint`] if `upstream_id` is
    /// already present.
    fn insert_document(&self, document: &Document, content: &DocumentContent) -> Result<(), StoreError>;

    /// Overwrite an existing document's fields and content in one atomic
    /// write (the update path of sync's per-document procedure).
    fn update_document(&self, document: &Document, content: &DocumentContent) -> Result<(), StoreError>;

    /// Patch only the two file-size columns of an already-persisted
    /// document (the pipelined metadata fetch's sole effect).
    fn patch_file_sizes(
        &self,
        document_id: &str,
        original_file_size: Option<u64>,
        archive_file_size: Option<u64>,
    ) -> Result<(), StoreError>;

    /// Delete every document, its content, signature, and any group
    /// memberships (used by `purge_before_sync`).
    fn purge_all_documents(&self) -> Result<(), StoreError>;

    /// Fetch a document's normalized content, if present.
    fn get_content(&self, document_id: &str) -> Result<Option<DocumentContent>, StoreError>;

    /// Fetch a document's current signature, if present.
    fn get_signature(&self, document_id: &str) -> Result<Option<DocumentSignature>, StoreError>;

    /// Insert or overwrite a document's signature.
    fn save_signature(&self, signature: &DocumentSignature) -> Result<(), StoreError>;

    /// List every signature whose `num_permutations` equals the given
    /// value — signatures with a mismatched length are not comparable and
    /// must be excluded by the caller (see §4.2 invariant).
    fn list_signatures(&self, num_permutations: usize) -> Result<Vec<DocumentSignature>, StoreError>;

    /// Drop a single document's signature, if any. A no-op if the document
    /// has none. Forces the next analysis run to regenerate it rather than
    /// reuse a signature that no longer reflects the document's content.
    fn delete_signature(&self, document_id: &str) -> Result<(), StoreError>;

    /// Mark the given documents `processing_status = completed`, in
    /// chunks sized by the implementation to respect bind-variable limits.
    fn mark_completed(&self, document_ids: &[String]) -> Result<(), StoreError>;

    /// Fetch the singleton sync-state row (defaulted if never written).
    fn get_sync_state(&self) -> Result<SyncState, StoreError>;

    /// Overwrite the singleton sync-state row.
    fn save_sync_state(&self, state: &SyncState) -> Result<(), StoreError>;

    /// List every existing duplicate group with its members.
    fn list_groups(&self) -> Result<Vec<GroupWithMembers>, StoreError>;

    /// Atomically apply Stage 8's reconciliation decision: update groups
    /// whose member set matched an existing group, create brand new
    /// groups, and delete groups that are no longer active and were
    /// neither reviewed nor resolved. All three sets commit in a single
    /// transaction; on failure, the store is left exactly as it was.
    fn reconcile_groups(
        &self,
        to_update: &[GroupWithMembers],
        to_create: &[GroupWithMembers],
        to_delete_ids: &[String],
    ) -> Result<(), StoreError>;
}
