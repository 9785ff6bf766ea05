use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Upstream auth failed or the connection never recovered — sync
    /// aborts without mutating already-committed documents.
    #[error("upstream error: {0}")]
    Upstream(#[from] upstream_client::UpstreamError),

    #[error("storage error: {0}")]
    Store(#[from] store::StoreError),
}
