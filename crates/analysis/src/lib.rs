//! The analysis orchestrator: the ten-stage pipeline that turns a corpus
//! of mirrored documents into a reconciled set of duplicate groups.
//!
//! Every stage is pure with respect to the [`store::Store`] it's handed —
//! no network I/O, no process-global state — so the whole pipeline is
//! exercised in tests against [`store::InMemoryStore`].

mod config;
mod error;
mod orchestrator;
mod progress;
mod result;

pub use config::{AnalysisOptions, DedupConfig, SCORING_BATCH_SIZE};
pub use error::AnalysisError;
pub use orchestrator::AnalysisOrchestrator;
pub use progress::{NullProgress, ProgressObserver};
pub use result::AnalysisResult;
