//! Change-detection fingerprinting: a SHA-256 digest over a canonical,
//! order-independent encoding of the upstream fields that matter for
//! similarity and classification.

use sha2::{Digest, Sha256};
use upstream_client::model::UpstreamDocument;

/// Compute the fingerprint for an upstream document. `tag_names`,
/// `correspondent_name`, and `document_type_name` are the resolved names
/// for the document's integer references (see the reference maps built at
/// the start of a sync run).
pub fn compute_fingerprint(
    doc: &UpstreamDocument,
    tag_names: &[String],
    correspondent_name: Option<&str>,
    document_type_name: Option<&str>,
) -> String {
    let mut sorted_tags = tag_names.to_vec();
    sorted_tags.sort_unstable();

    // Field order here is fixed by this function, not by upstream JSON
    // field order, so the encoding is already order-independent; sorting
    // tags makes tag *set* order irrelevant too.
    let fields = [
        format!("id={}", doc.id),
        format!("title={}", doc.title),
        format!("content={}", doc.content),
        format!("tags={}", sorted_tags.join(",")),
        format!("correspondent={}", correspondent_name.unwrap_or("")),
        format!("documentType={}", document_type_name.unwrap_or("")),
        format!("created={}", doc.created.map(|t| t.to_rfc3339()).unwrap_or_default()),
        format!("modified={}", doc.modified.map(|t| t.to_rfc3339()).unwrap_or_default()),
        format!("added={}", doc.added.map(|t| t.to_rfc3339()).unwrap_or_default()),
        format!("original_file_name={}", doc.original_file_name.as_deref().unwrap_or("")),
    ];

    // Unit separator keeps field boundaries unambiguous even if a value
    // happens to contain '='.
    let joined = fields.join("\u{1f}");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: i64, title: &str, content: &str) -> UpstreamDocument {
        UpstreamDocument {
            id,
            title: title.to_string(),
            content: content.to_string(),
            tags: vec![],
            correspondent: None,
            document_type: None,
            created: Some(Utc::now()),
            modified: Some(Utc::now()),
            added: Some(Utc::now()),
            original_file_name: Some("file.pdf".to_string()),
        }
    }

    #[test]
    fn identical_inputs_produce_identical_fingerprints() {
        let d = doc(1, "Invoice", "content");
        let a = compute_fingerprint(&d, &[], None, None);
        let b = compute_fingerprint(&d, &[], None, None);
        assert_eq!(a, b);
    }

    #[test]
    fn tag_order_does_not_affect_fingerprint() {
        let d = doc(1, "Invoice", "content");
        let a = compute_fingerprint(&d, &["b".to_string(), "a".to_string()], None, None);
        let b = compute_fingerprint(&d, &["a".to_string(), "b".to_string()], None, None);
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_produces_different_fingerprint() {
        let d1 = doc(1, "Invoice", "content one");
        let d2 = doc(1, "Invoice", "content two");
        assert_ne!(
            compute_fingerprint(&d1, &[], None, None),
            compute_fingerprint(&d2, &[], None, None)
        );
    }

    #[test]
    fn fingerprint_is_lowercase_hex_sha256_length() {
        let d = doc(1, "Invoice", "content");
        let fp = compute_fingerprint(&d, &[], None, None);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
