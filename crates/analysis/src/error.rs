use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("storage error: {0}")]
    Store(#[from] store::StoreError),

    #[error("lsh index error: {0}")]
    Lsh(#[from] lsh::LshError),
}
