//! Workspace umbrella crate for dupehound.
//!
//! `dupehound` re-exports the textual near-duplicate detection pipeline so
//! applications can drive sync and analysis through a single dependency:
//! text normalization and shingling, MinHash signatures, banded LSH
//! candidate retrieval, fuzzy text and metadata scoring, union-find group
//! formation, relational persistence, an upstream HTTP client, and the two
//! top-level engines that tie them together — [`sync::SyncEngine`] (mirror
//! the upstream corpus) and [`analysis::AnalysisOrchestrator`] (find and
//! reconcile duplicate groups).
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use dupehound::{AnalysisOptions, AnalysisOrchestrator, DedupConfig, InMemoryStore, NullProgress};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::new());
//! let orchestrator = AnalysisOrchestrator::new(store);
//! let result = orchestrator.run(&DedupConfig::default(), AnalysisOptions::default(), &NullProgress)?;
//! println!("{} groups created", result.groups_created);
//! # Ok(())
//! # }
//! ```
//!
//! Wiring a real deployment additionally needs a [`ReqwestUpstreamClient`]
//! and a [`SqliteStore`], both constructed from a [`config::DupehoundConfig`]
//! loaded once at startup — see `demos/sync_and_analyze.rs`.

pub use analysis::{
    AnalysisError, AnalysisOptions, AnalysisOrchestrator, AnalysisResult, DedupConfig,
};
pub use fuzzytext::{ratio as fuzzy_ratio, sample as fuzzy_sample};
pub use lsh::{LshConfig, LshError, LshIndex};
pub use minhash::{MinHashError, MinHasher};
pub use scoring::{score_pair, PairScore, ScoreWeights, ScoringPayload};
pub use store::{
    Document, DocumentContent, DocumentSignature, DuplicateGroup, DuplicateGroupMember,
    GroupWithMembers, InMemoryStore, ProcessingStatus, SqliteStore, Store, StoreError, SyncState,
};
pub use sync::{
    NullProgress as SyncNullProgress, ProgressObserver as SyncProgressObserver, SyncConfig,
    SyncEngine, SyncError, SyncResult,
};
pub use textnorm::{normalize, shingle, NormalizedText};
pub use unionfind::UnionFind;
pub use upstream_client::{
    AuthMode, ReqwestUpstreamClient, UpstreamClient, UpstreamClientConfig, UpstreamError,
};

// `analysis::ProgressObserver` and `sync::ProgressObserver` are distinct
// traits (one crate per progress budget); re-export both under names that
// don't collide.
pub use analysis::{NullProgress, ProgressObserver};

pub mod config;
