//! Metadata similarity, filename similarity, and weighted multi-factor
//! pair scoring.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The subset of document fields needed to score a pair. Cheap to clone so
/// callers can batch-load these independently of the full document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPayload {
    pub doc_id: String,
    pub upstream_id: i64,
    pub correspondent: Option<String>,
    pub document_type: Option<String>,
    pub original_file_size: Option<u64>,
    pub archive_file_size: Option<u64>,
    pub created: Option<NaiveDate>,
    pub original_file_name: Option<String>,
    /// Sampled normalized text, present only when the fuzzy weight is active.
    pub sampled_text: Option<String>,
}

/// Non-negative integer weights for the four scoring components. Only
/// components with a positive weight *and* computable inputs contribute to
/// the overall score; the rest are renormalised away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub jaccard: u32,
    pub fuzzy: u32,
    pub metadata: u32,
    pub filename: u32,
}

impl Default for ScoreWeights {
    /// Recommended default: weight Jaccard heavily, fuzzy text lightly,
    /// metadata and filename off.
    fn default() -> Self {
        Self {
            jaccard: 90,
            fuzzy: 10,
            metadata: 0,
            filename: 0,
        }
    }
}

/// The five values a pair score reports: overall plus each component that
/// was actually used (0.0 for components that didn't contribute).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub overall: f64,
    pub jaccard: f64,
    pub fuzzy: f64,
    pub metadata: f64,
    pub filename: f64,
}

/// Fraction of `similarity_threshold` below which a candidate's Jaccard
/// estimate is too low to ever pass scoring, letting callers skip the
/// expensive fuzzy/metadata work entirely.
pub const PREFILTER_FACTOR: f64 = 0.8;

/// Whether a candidate pair's Jaccard estimate clears the pre-filter bar.
pub fn passes_prefilter(jaccard_estimate: f64, similarity_threshold: f64) -> bool {
    jaccard_estimate >= PREFILTER_FACTOR * similarity_threshold
}

/// Score a pair given a precomputed Jaccard estimate and the two documents'
/// scoring payloads, per the configured weights.
pub fn score_pair(jaccard_estimate: f64, a: &ScoringPayload, b: &ScoringPayload, weights: &ScoreWeights) -> PairScore {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    let mut fuzzy_used = 0.0;
    let mut metadata_used = 0.0;
    let mut filename_used = 0.0;

    if weights.jaccard > 0 {
        weighted_sum += weights.jaccard as f64 * jaccard_estimate;
        weight_total += weights.jaccard as f64;
    }

    if weights.fuzzy > 0 {
        if let (Some(sa), Some(sb)) = (&a.sampled_text, &b.sampled_text) {
            fuzzy_used = fuzzytext::ratio(sa, sb);
            weighted_sum += weights.fuzzy as f64 * fuzzy_used;
            weight_total += weights.fuzzy as f64;
        }
    }

    if weights.metadata > 0 {
        metadata_used = metadata_similarity(a, b);
        weighted_sum += weights.metadata as f64 * metadata_used;
        weight_total += weights.metadata as f64;
    }

    if weights.filename > 0 {
        filename_used = filename_similarity(a, b);
        weighted_sum += weights.filename as f64 * filename_used;
        weight_total += weights.filename as f64;
    }

    let overall = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };

    PairScore {
        overall,
        jaccard: jaccard_estimate,
        fuzzy: fuzzy_used,
        metadata: metadata_used,
        filename: filename_used,
    }
}

/// Average of independent metadata indicators that are computable for both
/// documents; 0 if none are computable.
pub fn metadata_similarity(a: &ScoringPayload, b: &ScoringPayload) -> f64 {
    let mut components: Vec<f64> = Vec::with_capacity(4);

    if let (Some(ca), Some(cb)) = (&a.correspondent, &b.correspondent) {
        components.push(same_trimmed_case_insensitive(ca, cb));
    }

    if let (Some(da), Some(db)) = (&a.document_type, &b.document_type) {
        components.push(same_trimmed_case_insensitive(da, db));
    }

    if let Some(proximity) = file_size_proximity(a, b) {
        components.push(proximity);
    }

    if let (Some(created_a), Some(created_b)) = (a.created, b.created) {
        components.push(created_date_proximity(created_a, created_b));
    }

    if components.is_empty() {
        0.0
    } else {
        components.iter().sum::<f64>() / components.len() as f64
    }
}

fn same_trimmed_case_insensitive(a: &str, b: &str) -> f64 {
    if a.trim().eq_ignore_ascii_case(b.trim()) {
        1.0
    } else {
        0.0
    }
}

fn file_size_proximity(a: &ScoringPayload, b: &ScoringPayload) -> Option<f64> {
    let sa = a.original_file_size.or(a.archive_file_size)?;
    let sb = b.original_file_size.or(b.archive_file_size)?;
    if sa == 0 && sb == 0 {
        return Some(1.0);
    }
    let max = sa.max(sb) as f64;
    let diff = (sa as i64 - sb as i64).unsigned_abs() as f64;
    Some(1.0 - (diff / max).min(1.0))
}

fn created_date_proximity(a: NaiveDate, b: NaiveDate) -> f64 {
    let days = (a - b).num_days().abs();
    if days == 0 {
        1.0
    } else if days <= 7 {
        0.5
    } else {
        0.0
    }
}

/// Token-set Jaccard similarity over filename stems (extension stripped,
/// split on non-alphanumerics, lowercased). 0 if either filename is missing.
pub fn filename_similarity(a: &ScoringPayload, b: &ScoringPayload) -> f64 {
    let (Some(fa), Some(fb)) = (&a.original_file_name, &b.original_file_name) else {
        return 0.0;
    };

    let tokens_a = filename_tokens(fa);
    let tokens_b = filename_tokens(fb);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn filename_tokens(filename: &str) -> HashSet<String> {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    stem.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(doc_id: &str, upstream_id: i64) -> ScoringPayload {
        ScoringPayload {
            doc_id: doc_id.to_string(),
            upstream_id,
            correspondent: None,
            document_type: None,
            original_file_size: None,
            archive_file_size: None,
            created: None,
            original_file_name: None,
            sampled_text: None,
        }
    }

    #[test]
    fn prefilter_accepts_jaccard_above_80_percent_of_threshold() {
        assert!(passes_prefilter(0.4, 0.5));
        assert!(!passes_prefilter(0.39, 0.5));
    }

    #[test]
    fn metadata_similarity_all_skipped_is_zero() {
        let a = payload("a", 1);
        let b = payload("b", 2);
        assert_eq!(metadata_similarity(&a, &b), 0.0);
    }

    #[test]
    fn metadata_similarity_correspondent_match_case_insensitive_trimmed() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.correspondent = Some(" Acme Corp ".to_string());
        b.correspondent = Some("acme corp".to_string());
        assert_eq!(metadata_similarity(&a, &b), 1.0);
    }

    #[test]
    fn metadata_similarity_mismatched_correspondent_is_zero_component() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.correspondent = Some("Acme".to_string());
        b.correspondent = Some("Globex".to_string());
        assert_eq!(metadata_similarity(&a, &b), 0.0);
    }

    #[test]
    fn metadata_similarity_averages_multiple_components() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.correspondent = Some("Acme".to_string());
        b.correspondent = Some("Acme".to_string());
        a.document_type = Some("invoice".to_string());
        b.document_type = Some("receipt".to_string());
        // correspondent match = 1.0, document_type mismatch = 0.0 => avg 0.5
        assert_eq!(metadata_similarity(&a, &b), 0.5);
    }

    #[test]
    fn file_size_proximity_identical_sizes_is_one() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.original_file_size = Some(1000);
        b.original_file_size = Some(1000);
        assert_eq!(metadata_similarity(&a, &b), 1.0);
    }

    #[test]
    fn file_size_proximity_uses_archive_size_as_fallback() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.archive_file_size = Some(500);
        b.archive_file_size = Some(1000);
        let expected = 1.0 - (500.0 / 1000.0);
        assert_eq!(metadata_similarity(&a, &b), expected);
    }

    #[test]
    fn created_date_same_day_is_one() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        a.created = Some(d);
        b.created = Some(d);
        assert_eq!(metadata_similarity(&a, &b), 1.0);
    }

    #[test]
    fn created_date_within_week_is_half() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.created = Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        b.created = Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(metadata_similarity(&a, &b), 0.5);
    }

    #[test]
    fn created_date_far_apart_is_zero() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.created = Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        b.created = Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(metadata_similarity(&a, &b), 0.0);
    }

    #[test]
    fn filename_similarity_missing_filename_is_zero() {
        let a = payload("a", 1);
        let mut b = payload("b", 2);
        b.original_file_name = Some("invoice_2024.pdf".to_string());
        assert_eq!(filename_similarity(&a, &b), 0.0);
    }

    #[test]
    fn filename_similarity_identical_stems_is_one() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.original_file_name = Some("Invoice-2024-Acme.pdf".to_string());
        b.original_file_name = Some("invoice_2024_acme.PDF".to_string());
        assert_eq!(filename_similarity(&a, &b), 1.0);
    }

    #[test]
    fn filename_similarity_partial_token_overlap() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.original_file_name = Some("invoice-2024-acme.pdf".to_string());
        b.original_file_name = Some("invoice-2024-globex.pdf".to_string());
        // {invoice,2024,acme} vs {invoice,2024,globex}: intersection 2, union 4
        assert_eq!(filename_similarity(&a, &b), 0.5);
    }

    #[test]
    fn score_pair_only_jaccard_weight_active() {
        let a = payload("a", 1);
        let b = payload("b", 2);
        let weights = ScoreWeights {
            jaccard: 1,
            fuzzy: 0,
            metadata: 0,
            filename: 0,
        };
        let score = score_pair(0.75, &a, &b, &weights);
        assert_eq!(score.overall, 0.75);
        assert_eq!(score.fuzzy, 0.0);
    }

    #[test]
    fn score_pair_zero_weights_yields_zero_without_panicking() {
        let a = payload("a", 1);
        let b = payload("b", 2);
        let weights = ScoreWeights {
            jaccard: 0,
            fuzzy: 0,
            metadata: 0,
            filename: 0,
        };
        let score = score_pair(0.9, &a, &b, &weights);
        assert_eq!(score.overall, 0.0);
    }

    #[test]
    fn score_pair_fuzzy_weight_skipped_without_sampled_text() {
        let a = payload("a", 1);
        let b = payload("b", 2);
        let weights = ScoreWeights {
            jaccard: 50,
            fuzzy: 50,
            metadata: 0,
            filename: 0,
        };
        // no sampled_text on either payload => fuzzy doesn't contribute,
        // so overall collapses to the jaccard value alone.
        let score = score_pair(0.6, &a, &b, &weights);
        assert_eq!(score.overall, 0.6);
    }

    #[test]
    fn score_pair_combines_jaccard_and_fuzzy_weighted() {
        let mut a = payload("a", 1);
        let mut b = payload("b", 2);
        a.sampled_text = Some("hello world".to_string());
        b.sampled_text = Some("hello world".to_string());
        let weights = ScoreWeights {
            jaccard: 90,
            fuzzy: 10,
            metadata: 0,
            filename: 0,
        };
        let score = score_pair(0.5, &a, &b, &weights);
        // fuzzy ratio of identical text is 1.0, so overall = (90*0.5 + 10*1.0)/100
        assert!((score.overall - 0.55).abs() < 1e-9);
    }

    #[test]
    fn default_weights_match_recommended_values() {
        let w = ScoreWeights::default();
        assert_eq!(w.jaccard, 90);
        assert_eq!(w.fuzzy, 10);
        assert_eq!(w.metadata, 0);
        assert_eq!(w.filename, 0);
    }
}
