use std::time::Duration;

use thiserror::Error;

/// Error taxonomy for the upstream HTTP client, matching the failure
/// categories the sync engine distinguishes behaviorally.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// 401/403 — surfaced to the caller, never retried, aborts sync
    /// without mutation.
    #[error("upstream authentication failed: {0}")]
    Auth(String),

    /// Connection failure that persisted through every retry attempt.
    #[error("upstream unavailable after retries: {0}")]
    Unavailable(String),

    /// Schema mismatch or unparseable response body — the offending
    /// document is skipped, sync continues.
    #[error("upstream protocol error: {0}")]
    Protocol(String),

    /// A 4xx other than 401/403/429 — surfaced immediately, not retried.
    #[error("upstream rejected request with status {status}: {body}")]
    ClientError { status: u16, body: String },

    /// 429 — retried after waiting `retry_after`, the upstream's requested
    /// `Retry-After` value (seconds or HTTP-date) clamped to
    /// [`crate::UpstreamClientConfig::max_retry_after`], or that cap itself
    /// when the header is absent or unparseable.
    #[error("upstream rate limited, retry after {retry_after:?}: {body}")]
    RateLimited { retry_after: Duration, body: String },
}
