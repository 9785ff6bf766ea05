//! N-gram shingle extraction over normalized text.

use std::collections::HashSet;

use xxhash_rust::xxh3::xxh3_64;

/// Default shingle window width in tokens.
pub const DEFAULT_NGRAM_SIZE: usize = 5;

/// Extract the set of 64-bit shingle ids from normalized text.
///
/// `normalized_text` must already be lowercased and whitespace-collapsed
/// (see [`crate::normalize`]). Splits on single spaces into a token list; if
/// there are fewer than `min_words` tokens the document is considered too
/// short to deduplicate reliably and `None` is returned (this is not an
/// error — see `TextNormError` docs).
///
/// Otherwise an `n`-token window slides across the token list and each
/// window's joined text is hashed into a 64-bit shingle id via a
/// well-distributed non-cryptographic hash. The result is the *set* of
/// distinct shingle ids; duplicate windows within one document collapse.
pub fn shingle(normalized_text: &str, n: usize, min_words: usize) -> Option<HashSet<u64>> {
    let tokens: Vec<&str> = if normalized_text.is_empty() {
        Vec::new()
    } else {
        normalized_text.split(' ').collect()
    };

    if tokens.len() < min_words {
        return None;
    }

    let n = n.max(1);
    if tokens.len() < n {
        return Some(HashSet::new());
    }

    let mut ids = HashSet::with_capacity(tokens.len() - n + 1);
    for window in tokens.windows(n) {
        let joined = window.join(" ");
        ids.insert(xxh3_64(joined.as_bytes()));
    }
    Some(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;

    #[test]
    fn below_min_words_returns_none() {
        let n = normalize("only five short words here");
        assert_eq!(n.word_count, 5);
        assert!(shingle(&n.text, 5, 20).is_none());
    }

    #[test]
    fn at_min_words_returns_some() {
        let text = (0..20)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let n = normalize(&text);
        assert_eq!(n.word_count, 20);
        assert!(shingle(&n.text, 5, 20).is_some());
    }

    #[test]
    fn shingle_count_matches_sliding_window_formula() {
        let text = (0..25)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let n = normalize(&text);
        let shingles = shingle(&n.text, 5, 20).unwrap();
        // all tokens distinct, so every window is unique => 25 - 5 + 1 = 21
        assert_eq!(shingles.len(), 21);
    }

    #[test]
    fn duplicate_windows_collapse_in_the_set() {
        let text = "the quick brown fox jumps the quick brown fox jumps the quick brown fox jumps the quick brown fox jumps";
        let n = normalize(text);
        let shingles = shingle(&n.text, 5, 20).unwrap();
        // the 5-token window repeats identically four times
        assert!(shingles.len() < n.word_count - 5 + 1);
    }

    #[test]
    fn identical_text_yields_identical_shingle_sets() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi rho sigma tau upsilon";
        let a = normalize(text);
        let b = normalize(text);
        assert_eq!(shingle(&a.text, 5, 20), shingle(&b.text, 5, 20));
    }

    #[test]
    fn empty_text_below_min_words_is_none() {
        assert!(shingle("", 5, 20).is_none());
    }

    #[test]
    fn min_words_zero_allows_any_length() {
        let n = normalize("a b c");
        let result = shingle(&n.text, 5, 0);
        assert!(result.is_some());
        // fewer tokens than window width => empty shingle set, not None
        assert!(result.unwrap().is_empty());
    }
}
