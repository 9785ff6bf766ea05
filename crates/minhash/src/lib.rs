//! Fixed-length MinHash signatures over 64-bit shingle sets.
//!
//! A signature is a `Vec<u32>` of `num_permutations` words. Construction
//! uses the classic universal-hashing MinHash scheme: for `i` in
//! `[0, num_permutations)`, a hash function `h_i(s) = ((a_i * s + b_i) mod M)
//! mod 2^32` is drawn from a family parameterized by constants `a_i`, `b_i`
//! derived deterministically from a single seed, with `M` a prime larger
//! than `2^32` (the Mersenne prime `2^61 - 1`). The `i`-th signature word is
//! the minimum of `h_i(s)` over every shingle `s` in the document.
//!
//! Two independent processes building a [`MinHasher`] with the same
//! `(num_permutations, seed)` derive bit-identical `a`/`b` tables and
//! therefore produce bit-identical signatures for the same shingle set —
//! this is required for the store to treat signatures as comparable only
//! when `num_permutations` matches (see [`jaccard`]).

use std::collections::HashSet;

use thiserror::Error;

/// Default MinHash length (number of permutations / signature words).
pub const DEFAULT_NUM_PERMUTATIONS: usize = 128;
/// Recommended length for production deployments — tighter Jaccard
/// estimates at the cost of a larger signature.
pub const RECOMMENDED_NUM_PERMUTATIONS: usize = 192;

/// Mersenne prime `2^61 - 1`, safely larger than `2^32` as required by the
/// universal hash family.
const MERSENNE_PRIME: u64 = (1u64 << 61) - 1;

/// Errors from MinHash signature operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MinHashError {
    /// Two signatures with differing `num_permutations` cannot be compared.
    #[error("incompatible signatures: {a} permutations vs {b} permutations")]
    IncompatibleSignature { a: usize, b: usize },
    /// A byte buffer is not an exact multiple of 4 bytes, or its length
    /// doesn't match the expected `4 * num_permutations`.
    #[error("invalid signature byte length: expected {expected} bytes, got {actual}")]
    InvalidByteLength { expected: usize, actual: usize },
}

/// A reusable family of hash-function parameters for a fixed
/// `(num_permutations, seed)` pair.
///
/// Building a [`MinHasher`] is the moderately expensive part (deriving
/// `num_permutations` pairs of constants); computing signatures from it is
/// cheap and can be repeated for many documents.
#[derive(Debug, Clone)]
pub struct MinHasher {
    num_permutations: usize,
    a: Vec<u64>,
    b: Vec<u64>,
}

impl MinHasher {
    /// Build a hasher for `num_permutations` signature words, deterministic
    /// for a given `seed`.
    pub fn new(num_permutations: usize, seed: u64) -> Self {
        let mut a = Vec::with_capacity(num_permutations);
        let mut b = Vec::with_capacity(num_permutations);
        for i in 0..num_permutations {
            let raw_a = splitmix64(seed.wrapping_add((2 * i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)));
            let raw_b = splitmix64(seed.wrapping_add((2 * i as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)));
            // a_i must be non-zero mod M, or permutation i degenerates to a constant.
            let a_i = (raw_a % (MERSENNE_PRIME - 1)) + 1;
            let b_i = raw_b % MERSENNE_PRIME;
            a.push(a_i);
            b.push(b_i);
        }
        Self {
            num_permutations,
            a,
            b,
        }
    }

    /// Number of permutations (and therefore signature length in words)
    /// this hasher produces.
    pub fn num_permutations(&self) -> usize {
        self.num_permutations
    }

    /// Compute the MinHash signature of a shingle set.
    ///
    /// An empty shingle set yields a signature of all `0xFFFFFFFF` words —
    /// the identity element under [`merge`], so folding in an empty
    /// document never changes an accumulated signature.
    pub fn signature(&self, shingles: &HashSet<u64>) -> Vec<u32> {
        let mut sig = vec![u32::MAX; self.num_permutations];
        for &s in shingles {
            for i in 0..self.num_permutations {
                let h = self.hash_one(i, s);
                if h < sig[i] {
                    sig[i] = h;
                }
            }
        }
        sig
    }

    /// Fold additional shingles into an existing signature in place.
    ///
    /// This is the incremental form of [`signature`](Self::signature): the
    /// result is identical to recomputing the signature over the union of
    /// the shingle sets already folded in.
    pub fn update(&self, sig: &mut [u32], shingles: &HashSet<u64>) {
        for &s in shingles {
            for i in 0..self.num_permutations.min(sig.len()) {
                let h = self.hash_one(i, s);
                if h < sig[i] {
                    sig[i] = h;
                }
            }
        }
    }

    #[inline]
    fn hash_one(&self, i: usize, s: u64) -> u32 {
        let h = ((self.a[i] as u128 * s as u128 + self.b[i] as u128) % MERSENNE_PRIME as u128) as u64;
        (h & 0xFFFF_FFFF) as u32
    }
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Element-wise minimum merge of two signatures of equal length.
///
/// MinHash update is commutative and associative: merging two signatures
/// built over shingle sets A and B yields the same signature as computing
/// it directly over `A ∪ B`. Panics if the lengths differ — callers should
/// check `num_permutations` compatibility first (see [`jaccard`] for the
/// fallible equivalent when lengths are untrusted).
pub fn merge(a: &[u32], b: &[u32]) -> Vec<u32> {
    assert_eq!(a.len(), b.len(), "cannot merge signatures of different length");
    a.iter().zip(b).map(|(&x, &y)| x.min(y)).collect()
}

/// Estimate Jaccard similarity between two signatures: the fraction of
/// slots that agree.
///
/// Requires `a.len() == b.len()`; signatures built with a different
/// `num_permutations` are not comparable.
pub fn jaccard(a: &[u32], b: &[u32]) -> Result<f64, MinHashError> {
    if a.len() != b.len() {
        return Err(MinHashError::IncompatibleSignature {
            a: a.len(),
            b: b.len(),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let matches = a.iter().zip(b).filter(|(x, y)| x == y).count();
    Ok(matches as f64 / a.len() as f64)
}

/// Serialize a signature to exactly `4 * signature.len()` little-endian
/// bytes.
pub fn to_bytes(signature: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(signature.len() * 4);
    for word in signature {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}

/// Deserialize a signature from little-endian bytes. `bytes.len()` must be
/// a non-zero multiple of 4; the resulting `Vec<u32>` has `bytes.len() / 4`
/// words.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<u32>, MinHashError> {
    if bytes.len() % 4 != 0 {
        return Err(MinHashError::InvalidByteLength {
            expected: (bytes.len() / 4 + 1) * 4,
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
