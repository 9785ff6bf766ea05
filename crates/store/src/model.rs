//! Data model types shared by every store backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle marker for a document's signature/group analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Completed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => ProcessingStatus::Completed,
            _ => ProcessingStatus::Pending,
        }
    }
}

/// A mirrored upstream document. Owns its [`DocumentContent`] and
/// [`DocumentSignature`] exclusively; never deleted by sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub upstream_id: i64,
    pub title: String,
    pub correspondent: Option<String>,
    pub document_type: Option<String>,
    pub tags: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub added: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub original_file_size: Option<u64>,
    pub archive_file_size: Option<u64>,
    pub original_file_name: Option<String>,
    pub fingerprint: Option<String>,
    pub processing_status: ProcessingStatus,
    pub synced_at: Option<DateTime<Utc>>,
}

/// 1:1 with [`Document`]; co-created/updated in the same atomic unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub document_id: String,
    pub full_text: String,
    pub normalized_text: String,
    pub word_count: usize,
    pub content_hash: String,
}

/// 1:1 with [`Document`], but may lag behind it (signatures are generated
/// by analysis, not sync).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSignature {
    pub document_id: String,
    /// Raw little-endian bytes, exactly `4 * num_permutations` long.
    pub minhash_signature: Vec<u8>,
    pub algorithm_version: String,
    pub num_permutations: usize,
    pub created_at: DateTime<Utc>,
}

/// A cluster of documents judged to be near-duplicates.
///
/// Identified, across analysis runs, by the *set* of its member documents
/// rather than by `id` — see [`crate::group_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: String,
    pub confidence_score: f64,
    pub jaccard_similarity: f64,
    pub fuzzy_text_ratio: f64,
    pub metadata_similarity: f64,
    pub filename_similarity: f64,
    pub algorithm_version: String,
    pub reviewed: bool,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single document's membership in a [`DuplicateGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroupMember {
    pub group_id: String,
    pub document_id: String,
    pub is_primary: bool,
}

/// A complete group plus its resolved member rows — the unit reconciliation
/// operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupWithMembers {
    pub group: DuplicateGroup,
    pub members: Vec<DuplicateGroupMember>,
}

impl GroupWithMembers {
    /// The canonical reconciliation key: sorted member document ids joined
    /// by `|`.
    pub fn member_key(&self) -> String {
        group_key(self.members.iter().map(|m| m.document_id.as_str()))
    }
}

/// Compute the canonical reconciliation key for a set of member document
/// ids: sort them, then join with `|`.
pub fn group_key<'a, I: IntoIterator<Item = &'a str>>(ids: I) -> String {
    let mut sorted: Vec<&str> = ids.into_iter().collect();
    sorted.sort_unstable();
    sorted.join("|")
}

/// Singleton row tracking the last sync/analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_analysis_at: Option<DateTime<Utc>>,
    pub last_sync_document_count: u64,
    pub total_documents: u64,
    pub total_duplicate_groups: u64,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            last_sync_at: None,
            last_analysis_at: None,
            last_sync_document_count: 0,
            total_documents: 0,
            total_duplicate_groups: 0,
        }
    }
}
