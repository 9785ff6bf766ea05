//! End-to-end duplicate-detection scenarios exercised against
//! [`dupehound::InMemoryStore`] through the public [`dupehound`] API.

use std::sync::{Arc, Mutex};

use dupehound::{
    AnalysisOptions, AnalysisOrchestrator, DedupConfig, Document, DocumentContent, InMemoryStore,
    ProcessingStatus, ProgressObserver, Store,
};

#[derive(Default)]
struct CollectingProgress {
    fractions: Mutex<Vec<f64>>,
}

impl ProgressObserver for CollectingProgress {
    fn on_progress(&self, fraction: f64) {
        self.fractions.lock().unwrap().push(fraction);
    }
}

impl CollectingProgress {
    fn assert_well_formed(&self) {
        let fractions = self.fractions.lock().unwrap();
        assert!(!fractions.is_empty(), "progress observer was never called");
        assert!(fractions[0] <= 0.05, "first fraction {} must be <= 0.05", fractions[0]);
        assert_eq!(*fractions.last().unwrap(), 1.0, "final fraction must be exactly 1.0");
        for pair in fractions.windows(2) {
            assert!(pair[1] >= pair[0], "progress must be non-decreasing: {fractions:?}");
        }
    }
}

fn hundred_token_core() -> String {
    "the quick brown fox jumps over the lazy dog crossing the meadow at dawn "
        .repeat(8)
        .trim()
        .to_string()
}

fn seed_document(store: &InMemoryStore, id: &str, upstream_id: i64, text: &str) {
    let normalized = dupehound::normalize(text);
    let document = Document {
        id: id.to_string(),
        upstream_id,
        title: format!("doc {upstream_id}"),
        correspondent: None,
        document_type: None,
        tags: vec![],
        created: None,
        added: None,
        modified: None,
        original_file_size: None,
        archive_file_size: None,
        original_file_name: None,
        fingerprint: Some(format!("fp-{upstream_id}")),
        processing_status: ProcessingStatus::Pending,
        synced_at: None,
    };
    let content = DocumentContent {
        document_id: id.to_string(),
        full_text: text.to_string(),
        normalized_text: normalized.text,
        word_count: normalized.word_count,
        content_hash: normalized.content_hash,
    };
    store.insert_document(&document, &content).unwrap();
}

/// Scenario 2: three documents share a common 100-token core and each
/// appends a distinct short tail. A single transitive group should form
/// covering all three.
#[test]
fn transitive_triangle_forms_one_group_of_three() {
    let store = Arc::new(InMemoryStore::new());
    let core = hundred_token_core();
    seed_document(&store, "doc-a", 1, &format!("{core} regarding the alpha shipment"));
    seed_document(&store, "doc-b", 2, &format!("{core} regarding the beta invoice"));
    seed_document(&store, "doc-c", 3, &format!("{core} regarding the gamma renewal"));

    let orchestrator = AnalysisOrchestrator::new(store.clone());
    let config = DedupConfig::default();
    let progress = CollectingProgress::default();
    let result = orchestrator
        .run(&config, AnalysisOptions::default(), &progress)
        .unwrap();
    progress.assert_well_formed();

    assert_eq!(result.signatures_generated, 3);

    let groups = store.list_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members.len(), 3);
}

/// Scenario 4: after an initial 2-member group, a third near-duplicate
/// document is seeded and incremental analysis runs again. The old 2-member
/// group must be removed and a new 3-member group created in its place.
#[test]
fn third_near_duplicate_subsumes_the_existing_group() {
    let store = Arc::new(InMemoryStore::new());
    let core = hundred_token_core();
    seed_document(&store, "doc-a", 1, &core);
    seed_document(&store, "doc-b", 2, &core);

    let orchestrator = AnalysisOrchestrator::new(store.clone());
    let config = DedupConfig::default();
    orchestrator
        .run(&config, AnalysisOptions::default(), &dupehound::NullProgress)
        .unwrap();

    let first_groups = store.list_groups().unwrap();
    assert_eq!(first_groups.len(), 1);
    assert_eq!(first_groups[0].members.len(), 2);
    let original_group_id = first_groups[0].group.id.clone();

    seed_document(&store, "doc-c", 3, &format!("{core} with minor variation added"));

    let progress = CollectingProgress::default();
    let second_result = orchestrator
        .run(&config, AnalysisOptions::default(), &progress)
        .unwrap();
    progress.assert_well_formed();

    assert_eq!(second_result.groups_removed, 1);
    assert_eq!(second_result.groups_created, 1);

    let second_groups = store.list_groups().unwrap();
    assert_eq!(second_groups.len(), 1);
    assert_eq!(second_groups[0].members.len(), 3);
    assert_ne!(second_groups[0].group.id, original_group_id);
}

/// Scenario 5: after an initial group forms, one member's content diverges
/// entirely and its signature is discarded. A forced re-run must delete the
/// now-stale group and create nothing in its place.
#[test]
fn content_divergence_deletes_stale_group_on_forced_rerun() {
    let store = Arc::new(InMemoryStore::new());
    let core = hundred_token_core();
    seed_document(&store, "doc-a", 1, &core);
    seed_document(&store, "doc-b", 2, &core);

    let orchestrator = AnalysisOrchestrator::new(store.clone());
    let config = DedupConfig::default();
    orchestrator
        .run(&config, AnalysisOptions::default(), &dupehound::NullProgress)
        .unwrap();
    assert_eq!(store.list_groups().unwrap().len(), 1);

    let doc_b = store.get_document("doc-b").unwrap().unwrap();
    let unrelated_text = "completely unrelated correspondence about kitchen renovations \
        and tile samples discussed over several unrelated phone calls last spring"
        .repeat(3);
    let normalized = dupehound::normalize(&unrelated_text);
    let updated_content = DocumentContent {
        document_id: doc_b.id.clone(),
        full_text: unrelated_text.clone(),
        normalized_text: normalized.text,
        word_count: normalized.word_count,
        content_hash: normalized.content_hash,
    };
    store.update_document(&doc_b, &updated_content).unwrap();
    store.delete_signature(&doc_b.id).unwrap();

    let progress = CollectingProgress::default();
    let result = orchestrator
        .run(&config, AnalysisOptions { force: true }, &progress)
        .unwrap();
    progress.assert_well_formed();

    assert_eq!(result.groups_removed, 1);
    assert_eq!(result.groups_created, 0);
    assert!(store.list_groups().unwrap().is_empty());
}
