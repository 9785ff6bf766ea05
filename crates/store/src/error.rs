use thiserror::Error;

/// Errors surfaced by any [`crate::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A constraint violation (uniqueness, foreign key). Callers should
    /// treat the enclosing transaction as rolled back.
    #[error("storage constraint violation: {0}")]
    Constraint(String),

    /// The underlying SQLite driver returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to check out a pooled connection.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A row referenced an id that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A migration or schema-setup step failed.
    #[error("migration failed: {0}")]
    Migration(String),
}
