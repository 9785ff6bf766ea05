//! Bounded fuzzy text comparison: deterministic sampling of long documents
//! plus a Levenshtein-ratio similarity score.

/// Deterministic window sampling for bounding comparison cost on very long
/// documents.
///
/// If `text` is already within `max_chars`, it is returned unchanged.
/// Otherwise three equal-width slices are taken — from the start, the
/// midpoint, and the end — and joined with a single space, for a combined
/// length of approximately `max_chars`.
pub fn sample(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let slice_width = max_chars / 3;
    let start: String = chars[..slice_width].iter().collect();

    let mid_point = chars.len() / 2;
    let mid_start = mid_point.saturating_sub(slice_width / 2);
    let mid_end = (mid_start + slice_width).min(chars.len());
    let middle: String = chars[mid_start..mid_end].iter().collect();

    let end_start = chars.len() - slice_width.min(chars.len());
    let end: String = chars[end_start..].iter().collect();

    [start, middle, end].join(" ")
}

/// Levenshtein-derived similarity ratio in `[0, 1]`:
/// `1 - edit_distance(a, b) / max(|a|, |b|)`.
///
/// Empty-on-empty returns `1.0`; empty-vs-nonempty returns `0.0`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();

    if a_len == 0 && b_len == 0 {
        return 1.0;
    }
    if a_len == 0 || b_len == 0 {
        return 0.0;
    }

    let distance = strsim::levenshtein(a, b);
    let max_len = a_len.max(b_len);
    1.0 - (distance as f64 / max_len as f64)
}
