//! Whitespace collapsing, lowercasing, and content hashing.

use sha2::{Digest, Sha256};

/// Result of normalizing a document's raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    /// Lowercased, whitespace-collapsed, trimmed text.
    pub text: String,
    /// Count of whitespace-separated non-empty tokens in `text`.
    pub word_count: usize,
    /// Lowercase hex SHA-256 digest of `text`.
    pub content_hash: String,
}

/// Normalize raw document text: Unicode-aware lowercase, whitespace
/// collapse, trim. Returns the normalized text alongside its word count and
/// content hash.
///
/// Whitespace here means any run of Unicode whitespace (spaces, tabs,
/// newlines, carriage returns, and other Unicode space separators) — each
/// run collapses to a single ASCII space.
pub fn normalize(text: &str) -> NormalizedText {
    let lowered = text.to_lowercase();
    let collapsed = collapse_whitespace(&lowered);
    let word_count = collapsed.split(' ').filter(|t| !t.is_empty()).count();
    let content_hash = hash_text(&collapsed);

    NormalizedText {
        text: collapsed,
        word_count,
        content_hash,
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true; // swallow leading whitespace
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
