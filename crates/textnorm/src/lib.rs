//! Deterministic text normalization and shingle extraction.
//!
//! This is the leaf of the dedup pipeline: every other crate (`minhash`,
//! `lsh`, `fuzzytext`, `scoring`) consumes the output of [`normalize`] and
//! [`shingle`] rather than raw document text. Both functions are pure: same
//! input text and parameters always produce the same output, with no I/O,
//! locale dependence, or process-global state.
//!
//! ## Pipeline
//!
//! 1. [`normalize`] lowercases (Unicode-aware), collapses whitespace runs to
//!    a single space, and trims the result. It also reports the word count
//!    and a SHA-256 content hash of the normalized text, both of which are
//!    persisted alongside the document (see the `store` crate's
//!    `DocumentContent`).
//! 2. [`shingle`] slides an n-token window across the normalized text and
//!    hashes each window into a 64-bit shingle id, returning the *set* of
//!    distinct ids (duplicate windows within one document collapse).
//!    Documents shorter than the configured minimum word count are not
//!    shingled at all — they cannot be deduplicated reliably.

mod normalize;
mod shingle;

pub use normalize::{normalize, NormalizedText};
pub use shingle::{shingle, DEFAULT_NGRAM_SIZE};

use thiserror::Error;

/// Errors from the normalization/shingling stage.
///
/// Currently reserved for future validation (e.g. rejecting non-UTF-8 input
/// upstream of this crate); `normalize` and `shingle` are total functions
/// over `&str` today and never fail, but callers should still match on this
/// type rather than assume it stays empty.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TextNormError {
    #[error("text exceeds maximum supported length of {max} bytes")]
    TooLong { max: usize },
}
