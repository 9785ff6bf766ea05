//! The sync engine: mirrors the upstream document corpus into local
//! storage, tracking change via a per-document fingerprint so unmodified
//! documents are skipped cheaply on repeat runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use store::{Document, DocumentContent, ProcessingStatus, Store, SyncState};
use upstream_client::model::{ReferenceItem, UpstreamDocument};
use upstream_client::UpstreamClient;

use crate::config::{SyncConfig, SyncType};
use crate::error::SyncError;
use crate::fingerprint::compute_fingerprint;
use crate::progress::ProgressObserver;

/// Outcome of one [`SyncEngine::run`] call.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub sync_type: SyncTypeReport,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub metadata_failures: u64,
}

/// Mirrors [`SyncType`] but is `Default`-able for [`SyncResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTypeReport {
    Full,
    Incremental,
}

impl Default for SyncTypeReport {
    fn default() -> Self {
        SyncTypeReport::Full
    }
}

impl From<SyncType> for SyncTypeReport {
    fn from(t: SyncType) -> Self {
        match t {
            SyncType::Full => SyncTypeReport::Full,
            SyncType::Incremental => SyncTypeReport::Incremental,
        }
    }
}

/// Mirrors the upstream corpus into a [`Store`] through an
/// [`UpstreamClient`]. Generic over both seams so tests run against
/// [`upstream_client::mock::MockUpstreamClient`] and
/// [`store::InMemoryStore`] with no network or disk I/O.
pub struct SyncEngine<C, S> {
    client: Arc<C>,
    store: Arc<S>,
}

impl<C, S> SyncEngine<C, S>
where
    C: UpstreamClient + 'static,
    S: Store + 'static,
{
    pub fn new(client: Arc<C>, store: Arc<S>) -> Self {
        Self { client, store }
    }

    /// Run one sync pass. `progress.on_progress` is called with a
    /// non-decreasing sequence of fractions, the first at or below 0.05 and
    /// the last exactly 1.0, even when the corpus is empty.
    #[instrument(skip(self, config, progress))]
    pub async fn run(
        &self,
        config: &SyncConfig,
        progress: &dyn ProgressObserver,
    ) -> Result<SyncResult, SyncError> {
        let started = std::time::Instant::now();
        progress.on_progress(0.0);

        if config.purge_before_sync {
            self.store.purge_all_documents()?;
        }

        let state = self.store.get_sync_state()?;
        let sync_type = if config.force_full_sync || state.last_sync_at.is_none() {
            SyncType::Full
        } else {
            SyncType::Incremental
        };

        progress.on_progress(0.02);
        let reference = self.build_reference_maps().await?;
        progress.on_progress(0.05);

        let cutoff = if sync_type == SyncType::Incremental {
            state.last_sync_at
        } else {
            None
        };

        let mut inserted = 0u64;
        let mut updated = 0u64;
        let mut skipped = 0u64;

        // Metadata fetches are dispatched the moment a document is inserted
        // or updated, overlapping with the still-running paging loop rather
        // than waiting for every page to be fetched first.
        let metadata_semaphore = Arc::new(Semaphore::new(config.metadata_concurrency.max(1)));
        let metadata_failures = Arc::new(AtomicUsize::new(0));
        let mut metadata_handles: Vec<tokio::task::JoinHandle<()>> = Vec::new();

        let mut page = 1u32;
        let mut stop = false;
        let total_count = self.client.get_statistics().await.map(|s| s.documents_total).ok();

        'paging: loop {
            let batch = self.client.list_documents(page, config.page_size).await?;
            if batch.results.is_empty() {
                break 'paging;
            }

            for upstream_doc in &batch.results {
                if let (Some(cutoff), Some(modified)) = (cutoff, upstream_doc.modified) {
                    if modified <= cutoff {
                        // Results are ordered by -modified: once we cross
                        // the cutoff, every remaining document on every
                        // remaining page is already up to date.
                        stop = true;
                        break;
                    }
                }

                let outcome = self.sync_one_document(upstream_doc, &reference, config).await?;
                match outcome {
                    SyncOutcome::Inserted(id) => {
                        inserted += 1;
                        metadata_handles.push(self.spawn_metadata_fetch(
                            upstream_doc.id,
                            id,
                            metadata_semaphore.clone(),
                            metadata_failures.clone(),
                        ));
                    }
                    SyncOutcome::Updated(id) => {
                        updated += 1;
                        metadata_handles.push(self.spawn_metadata_fetch(
                            upstream_doc.id,
                            id,
                            metadata_semaphore.clone(),
                            metadata_failures.clone(),
                        ));
                    }
                    SyncOutcome::Unchanged => skipped += 1,
                }
            }

            if stop || batch.next.is_none() {
                break 'paging;
            }
            page += 1;

            if let Some(total) = total_count {
                if total > 0 {
                    let seen = (inserted + updated + skipped) as f64;
                    let fraction = 0.05 + 0.75 * (seen / total as f64).min(1.0);
                    progress.on_progress(fraction.min(0.80));
                }
            }
        }

        progress.on_progress(0.80);

        // Every fetch was already dispatched above; this only waits for the
        // ones still in flight once paging is done.
        for handle in metadata_handles {
            let _ = handle.await;
        }
        let metadata_failures = metadata_failures.load(Ordering::Relaxed) as u64;

        progress.on_progress(0.97);

        let mut new_state = self.store.get_sync_state()?;
        new_state.last_sync_at = Some(Utc::now());
        new_state.last_sync_document_count = inserted + updated + skipped;
        let all_docs = self.store.list_documents(false)?;
        new_state.total_documents = all_docs.len() as u64;
        self.store.save_sync_state(&new_state)?;

        progress.on_progress(1.0);

        info!(
            sync_type = ?sync_type,
            inserted,
            updated,
            skipped,
            metadata_failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sync run complete"
        );

        Ok(SyncResult {
            sync_type: sync_type.into(),
            inserted,
            updated,
            skipped,
            metadata_failures,
        })
    }

    async fn build_reference_maps(&self) -> Result<ReferenceMaps, SyncError> {
        let (tags, correspondents, document_types) = tokio::try_join!(
            self.client.list_tags(),
            self.client.list_correspondents(),
            self.client.list_document_types(),
        )?;

        Ok(ReferenceMaps {
            tags: index_by_id(tags),
            correspondents: index_by_id(correspondents),
            document_types: index_by_id(document_types),
        })
    }

    async fn sync_one_document(
        &self,
        upstream_doc: &UpstreamDocument,
        reference: &ReferenceMaps,
        config: &SyncConfig,
    ) -> Result<SyncOutcome, SyncError> {
        let tag_names: Vec<String> = upstream_doc
            .tags
            .iter()
            .filter_map(|id| reference.tags.get(id).cloned())
            .collect();
        let correspondent_name = upstream_doc
            .correspondent
            .and_then(|id| reference.correspondents.get(&id).cloned());
        let document_type_name = upstream_doc
            .document_type
            .and_then(|id| reference.document_types.get(&id).cloned());

        let fingerprint = compute_fingerprint(
            upstream_doc,
            &tag_names,
            correspondent_name.as_deref(),
            document_type_name.as_deref(),
        );

        let existing = self.store.get_document_by_upstream_id(upstream_doc.id)?;
        if let Some(existing) = &existing {
            if existing.fingerprint.as_deref() == Some(fingerprint.as_str()) {
                return Ok(SyncOutcome::Unchanged);
            }
        }

        let mut full_text = upstream_doc.content.clone();
        full_text.truncate_chars_or_whole(config.max_ocr_length);
        let normalized = textnorm::normalize(&full_text);

        let document_id = existing.as_ref().map(|d| d.id.clone()).unwrap_or_else(new_document_id);
        let document = Document {
            id: document_id.clone(),
            upstream_id: upstream_doc.id,
            title: upstream_doc.title.clone(),
            correspondent: correspondent_name,
            document_type: document_type_name,
            tags: tag_names,
            created: upstream_doc.created,
            added: upstream_doc.added,
            modified: upstream_doc.modified,
            original_file_size: existing.as_ref().and_then(|d| d.original_file_size),
            archive_file_size: existing.as_ref().and_then(|d| d.archive_file_size),
            original_file_name: upstream_doc.original_file_name.clone(),
            fingerprint: Some(fingerprint),
            processing_status: ProcessingStatus::Pending,
            synced_at: Some(Utc::now()),
        };
        let content = DocumentContent {
            document_id: document_id.clone(),
            full_text,
            normalized_text: normalized.text,
            word_count: normalized.word_count,
            content_hash: normalized.content_hash,
        };

        if existing.is_some() {
            self.store.update_document(&document, &content)?;
            Ok(SyncOutcome::Updated(document_id))
        } else {
            self.store.insert_document(&document, &content)?;
            Ok(SyncOutcome::Inserted(document_id))
        }
    }

    /// Dispatch a single document's metadata (file sizes) fetch as its own
    /// task immediately, bounded to `semaphore`'s permit count across the
    /// whole run. A fetch failure is logged and counted, never propagated —
    /// sync's correctness does not depend on file-size metadata being
    /// present.
    fn spawn_metadata_fetch(
        &self,
        upstream_id: i64,
        document_id: String,
        semaphore: Arc<Semaphore>,
        failures: Arc<AtomicUsize>,
    ) -> tokio::task::JoinHandle<()> {
        let client = self.client.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            match client.get_document_metadata(upstream_id).await {
                Ok(meta) => {
                    if let Err(e) =
                        store.patch_file_sizes(&document_id, meta.original_size, meta.archive_size)
                    {
                        warn!(document_id, error = %e, "failed to persist fetched metadata");
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(e) => {
                    warn!(document_id, upstream_id, error = %e, "metadata fetch failed, skipping");
                    failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    }
}

struct ReferenceMaps {
    tags: HashMap<i64, String>,
    correspondents: HashMap<i64, String>,
    document_types: HashMap<i64, String>,
}

enum SyncOutcome {
    Inserted(String),
    Updated(String),
    Unchanged,
}

fn index_by_id(items: Vec<ReferenceItem>) -> HashMap<i64, String> {
    items.into_iter().map(|i| (i.id, i.name)).collect()
}

fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

trait TruncateCharsOrWhole {
    fn truncate_chars_or_whole(&mut self, max_chars: usize);
}

impl TruncateCharsOrWhole for String {
    fn truncate_chars_or_whole(&mut self, max_chars: usize) {
        if self.chars().count() > max_chars {
            let truncated: String = self.chars().take(max_chars).collect();
            *self = truncated;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;
    use store::InMemoryStore;
    use upstream_client::mock::MockUpstreamClient;

    fn doc(id: i64, title: &str, content: &str, modified: chrono::DateTime<Utc>) -> UpstreamDocument {
        UpstreamDocument {
            id,
            title: title.to_string(),
            content: content.to_string(),
            tags: vec![],
            correspondent: None,
            document_type: None,
            created: Some(modified),
            modified: Some(modified),
            added: Some(modified),
            original_file_name: Some(format!("doc-{id}.pdf")),
        }
    }

    #[tokio::test]
    async fn full_sync_inserts_every_upstream_document() {
        let now = Utc::now();
        let client = Arc::new(MockUpstreamClient::new(vec![
            doc(1, "Invoice One", "alpha beta gamma", now),
            doc(2, "Invoice Two", "delta epsilon zeta", now),
        ]));
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(client, store.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let observer = move |f: f64| seen_clone.lock().unwrap().push(f);

        let result = engine.run(&SyncConfig::default(), &observer).await.unwrap();
        assert_eq!(result.inserted, 2);
        assert_eq!(result.updated, 0);
        assert_eq!(result.skipped, 0);

        let docs = store.list_documents(false).unwrap();
        assert_eq!(docs.len(), 2);

        let fractions = seen.lock().unwrap().clone();
        assert!(fractions.first().copied().unwrap_or(1.0) <= 0.05);
        assert_eq!(fractions.last().copied(), Some(1.0));
        for i in 1..fractions.len() {
            assert!(fractions[i] >= fractions[i - 1]);
        }
    }

    #[tokio::test]
    async fn unchanged_document_is_skipped_on_second_sync() {
        let now = Utc::now();
        let client = Arc::new(MockUpstreamClient::new(vec![doc(1, "Invoice", "alpha beta", now)]));
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(client, store.clone());

        engine.run(&SyncConfig::default(), &crate::progress::NullProgress).await.unwrap();
        let second = engine.run(&SyncConfig::default(), &crate::progress::NullProgress).await.unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn changed_content_triggers_update_not_insert() {
        let now = Utc::now();
        let client = Arc::new(MockUpstreamClient::new(vec![doc(1, "Invoice", "alpha beta", now)]));
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(client.clone(), store.clone());
        engine.run(&SyncConfig::default(), &crate::progress::NullProgress).await.unwrap();

        client.replace_document(doc(1, "Invoice", "alpha beta CHANGED", now + ChronoDuration::seconds(1)));
        let result = engine.run(&SyncConfig::default(), &crate::progress::NullProgress).await.unwrap();

        assert_eq!(result.inserted, 0);
        assert_eq!(result.updated, 1);
        let docs = store.list_documents(false).unwrap();
        assert_eq!(docs.len(), 1);
        let content = store.get_content(&docs[0].id).unwrap().unwrap();
        assert!(content.full_text.contains("CHANGED"));
    }

    #[tokio::test]
    async fn incremental_sync_stops_at_modified_cutoff() {
        let base = Utc::now() - ChronoDuration::days(2);
        let client = Arc::new(MockUpstreamClient::new(vec![
            doc(1, "Old", "alpha", base),
            doc(2, "New", "beta", base + ChronoDuration::days(1)),
        ]));
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(client.clone(), store.clone());

        // First full sync establishes last_sync_at after both documents.
        engine.run(&SyncConfig::default(), &crate::progress::NullProgress).await.unwrap();

        // Add a third document modified after the recorded sync time.
        let after = Utc::now() + ChronoDuration::seconds(5);
        client.add_document(doc(3, "Newest", "gamma", after));

        let mut config = SyncConfig::default();
        config.force_full_sync = false;
        let result = engine.run(&config, &crate::progress::NullProgress).await.unwrap();

        assert_eq!(result.inserted, 1);
        assert_eq!(result.updated, 0);
    }

    #[tokio::test]
    async fn purge_before_sync_clears_existing_documents_first() {
        let now = Utc::now();
        let client = Arc::new(MockUpstreamClient::new(vec![doc(1, "Invoice", "alpha", now)]));
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(client.clone(), store.clone());
        engine.run(&SyncConfig::default(), &crate::progress::NullProgress).await.unwrap();

        client.set_documents(vec![doc(2, "Other", "beta", now)]);
        let mut config = SyncConfig::default();
        config.purge_before_sync = true;
        config.force_full_sync = true;
        engine.run(&config, &crate::progress::NullProgress).await.unwrap();

        let docs = store.list_documents(false).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].upstream_id, 2);
    }
}
