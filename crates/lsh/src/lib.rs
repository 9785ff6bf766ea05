//! Banded LSH index for fast MinHash candidate retrieval.
//!
//! A signature of `P` words is partitioned into `B` bands of `R = P / B`
//! words each. Per document, per band, the band's words are reduced to a
//! single 128-bit bucket key; the index stores, per band, a multimap from
//! bucket key to the set of document ids sharing that band. [`candidates`]
//! unions bucket membership across all bands, giving a small superset of
//! documents worth scoring exactly rather than every pair in the corpus.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use thiserror::Error;
use xxhash_rust::xxh3::xxh3_128;

/// Default number of bands. With the recommended `P = 192` this yields
/// `R = 9.6`... the spec's default `B = 20` assumes `P` divisible by `B`;
/// callers must pick a `P` that divides evenly (e.g. 120, 160, 200).
pub const DEFAULT_NUM_BANDS: usize = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LshError {
    #[error("signature length {signature_len} is not divisible by num_bands {num_bands}")]
    NotDivisible {
        signature_len: usize,
        num_bands: usize,
    },
    #[error("num_bands must be at least 1")]
    ZeroBands,
}

/// Configuration for a banded LSH index.
#[derive(Debug, Clone, Copy)]
pub struct LshConfig {
    pub num_bands: usize,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            num_bands: DEFAULT_NUM_BANDS,
        }
    }
}

impl LshConfig {
    pub fn new(num_bands: usize) -> Self {
        Self { num_bands }
    }

    fn validate(&self, signature_len: usize) -> Result<usize, LshError> {
        if self.num_bands == 0 {
            return Err(LshError::ZeroBands);
        }
        if signature_len % self.num_bands != 0 {
            return Err(LshError::NotDivisible {
                signature_len,
                num_bands: self.num_bands,
            });
        }
        Ok(signature_len / self.num_bands)
    }
}

type BucketKey = u128;

/// A banded LSH index. Built fresh per analysis run; not persisted.
///
/// Interior-mutable via `RwLock` per band table so inserts from a
/// document-level rebuild loop can run without an outer lock on the whole
/// index, mirroring the store's per-key-space locking convention.
pub struct LshIndex {
    config: LshConfig,
    rows_per_band: usize,
    bands: Vec<RwLock<HashMap<BucketKey, HashSet<String>>>>,
}

impl LshIndex {
    /// Build an empty index sized for signatures of `signature_len` words.
    pub fn new(config: LshConfig, signature_len: usize) -> Result<Self, LshError> {
        let rows_per_band = config.validate(signature_len)?;
        let bands = (0..config.num_bands).map(|_| RwLock::new(HashMap::new())).collect();
        Ok(Self {
            config,
            rows_per_band,
            bands,
        })
    }

    pub fn num_bands(&self) -> usize {
        self.config.num_bands
    }

    pub fn rows_per_band(&self) -> usize {
        self.rows_per_band
    }

    /// Insert a document's signature into every band bucket. Idempotent:
    /// inserting the same `(doc_id, signature)` twice leaves the index
    /// unchanged, since band buckets are sets.
    pub fn insert(&self, doc_id: &str, signature: &[u32]) {
        for (band_idx, band_table) in self.bands.iter().enumerate() {
            let key = self.band_key(band_idx, signature);
            let mut guard = band_table.write().expect("lsh band lock poisoned");
            guard.entry(key).or_default().insert(doc_id.to_string());
        }
    }

    /// Remove a document from every band bucket it was inserted into.
    pub fn remove(&self, doc_id: &str, signature: &[u32]) {
        for (band_idx, band_table) in self.bands.iter().enumerate() {
            let key = self.band_key(band_idx, signature);
            let mut guard = band_table.write().expect("lsh band lock poisoned");
            if let Some(bucket) = guard.get_mut(&key) {
                bucket.remove(doc_id);
                if bucket.is_empty() {
                    guard.remove(&key);
                }
            }
        }
    }

    /// Union of band bucket members for `signature`, excluding `self_id` if
    /// given (the caller's own document, which always collides with
    /// itself on every band).
    pub fn candidates(&self, signature: &[u32], self_id: Option<&str>) -> HashSet<String> {
        let mut out = HashSet::new();
        for (band_idx, band_table) in self.bands.iter().enumerate() {
            let key = self.band_key(band_idx, signature);
            let guard = band_table.read().expect("lsh band lock poisoned");
            if let Some(bucket) = guard.get(&key) {
                out.extend(bucket.iter().cloned());
            }
        }
        if let Some(id) = self_id {
            out.remove(id);
        }
        out
    }

    fn band_key(&self, band_idx: usize, signature: &[u32]) -> BucketKey {
        let start = band_idx * self.rows_per_band;
        let end = start + self.rows_per_band;
        let band = &signature[start..end];
        let mut bytes = Vec::with_capacity(band.len() * 4);
        for word in band {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        xxh3_128(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(words: &[u32]) -> Vec<u32> {
        words.to_vec()
    }

    #[test]
    fn rejects_non_divisible_signature_length() {
        let config = LshConfig::new(7);
        assert!(matches!(
            LshIndex::new(config, 10),
            Err(LshError::NotDivisible {
                signature_len: 10,
                num_bands: 7
            })
        ));
    }

    #[test]
    fn rejects_zero_bands() {
        let config = LshConfig::new(0);
        assert!(matches!(LshIndex::new(config, 10), Err(LshError::ZeroBands)));
    }

    #[test]
    fn insert_then_candidates_finds_identical_signature() {
        let index = LshIndex::new(LshConfig::new(4), 20).unwrap();
        let a = sig(&(0..20).collect::<Vec<u32>>());
        let b = a.clone();
        index.insert("doc-a", &a);
        index.insert("doc-b", &b);

        let candidates = index.candidates(&a, Some("doc-a"));
        assert_eq!(candidates.len(), 1);
        assert!(candidates.contains("doc-b"));
    }

    #[test]
    fn self_id_is_excluded_from_candidates() {
        let index = LshIndex::new(LshConfig::new(4), 20).unwrap();
        let a = sig(&(0..20).collect::<Vec<u32>>());
        index.insert("doc-a", &a);
        let candidates = index.candidates(&a, Some("doc-a"));
        assert!(candidates.is_empty());
    }

    #[test]
    fn insert_is_idempotent() {
        let index = LshIndex::new(LshConfig::new(4), 20).unwrap();
        let a = sig(&(0..20).collect::<Vec<u32>>());
        index.insert("doc-a", &a);
        index.insert("doc-a", &a);
        index.insert("doc-a", &a);
        let candidates = index.candidates(&a, None);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn fully_disjoint_signatures_rarely_share_any_band() {
        let index = LshIndex::new(LshConfig::new(20), 200).unwrap();
        let a = sig(&(0..200).collect::<Vec<u32>>());
        let b = sig(&(1_000_000..1_000_200).collect::<Vec<u32>>());
        index.insert("doc-a", &a);
        let candidates = index.candidates(&b, None);
        assert!(candidates.is_empty());
    }

    #[test]
    fn remove_drops_document_from_all_bands() {
        let index = LshIndex::new(LshConfig::new(4), 20).unwrap();
        let a = sig(&(0..20).collect::<Vec<u32>>());
        index.insert("doc-a", &a);
        index.remove("doc-a", &a);
        let candidates = index.candidates(&a, None);
        assert!(candidates.is_empty());
    }

    #[test]
    fn candidates_union_across_bands_not_intersection() {
        // Two signatures that share exactly one band should still show up as candidates.
        let index = LshIndex::new(LshConfig::new(4), 20).unwrap();
        let mut a: Vec<u32> = (0..20).collect();
        let mut b: Vec<u32> = (100..120).collect();
        // Make band 0 (rows 0..5) identical between a and b.
        for i in 0..5 {
            b[i] = a[i];
        }
        index.insert("doc-a", &a);
        let candidates = index.candidates(&b, None);
        assert!(candidates.contains("doc-a"));
        let _ = &mut a; // silence unused-mut if rows_per_band math changes later
    }

    #[test]
    fn end_to_end_with_real_minhash_signatures() {
        use minhash::MinHasher;
        use std::collections::HashSet as StdHashSet;

        let hasher = MinHasher::new(200, 42);
        let shingles_a: StdHashSet<u64> = (0..100).collect();
        let mut shingles_b = shingles_a.clone();
        shingles_b.insert(9_999_999);

        let sig_a = hasher.signature(&shingles_a);
        let sig_b = hasher.signature(&shingles_b);

        let index = LshIndex::new(LshConfig::new(20), 200).unwrap();
        index.insert("doc-a", &sig_a);
        let candidates = index.candidates(&sig_b, None);
        assert!(candidates.contains("doc-a"));
    }
}
