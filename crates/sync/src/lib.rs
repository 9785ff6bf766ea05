//! Incremental sync engine: mirrors the upstream document corpus into a
//! [`store::Store`] through an [`upstream_client::UpstreamClient`].
//!
//! The engine tracks change per document via a content fingerprint rather
//! than relying solely on upstream's `modified` timestamp, so a document
//! touched without a meaningful field change is still skipped. Incremental
//! runs walk the upstream corpus ordered by `-modified` and stop as soon as
//! they cross the last successful sync's timestamp.

mod config;
mod engine;
mod error;
mod fingerprint;
mod progress;

pub use config::{SyncConfig, SyncType};
pub use engine::{SyncEngine, SyncResult, SyncTypeReport};
pub use error::SyncError;
pub use fingerprint::compute_fingerprint;
pub use progress::{NullProgress, ProgressObserver};
