//! An in-memory [`UpstreamClient`] for tests and the demo binary — no HTTP
//! involved.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::UpstreamClient;
use crate::error::UpstreamError;
use crate::model::{Page, ReferenceItem, Statistics, UpstreamDocument, UpstreamDocumentMetadata};

/// A fixed corpus of documents served page-by-page, pre-sorted by the
/// caller as `-modified` would require.
pub struct MockUpstreamClient {
    documents: Mutex<Vec<UpstreamDocument>>,
    metadata: Mutex<std::collections::HashMap<i64, UpstreamDocumentMetadata>>,
    tags: Vec<ReferenceItem>,
    correspondents: Vec<ReferenceItem>,
    document_types: Vec<ReferenceItem>,
}

impl MockUpstreamClient {
    pub fn new(documents: Vec<UpstreamDocument>) -> Self {
        Self {
            documents: Mutex::new(documents),
            metadata: Mutex::new(std::collections::HashMap::new()),
            tags: Vec::new(),
            correspondents: Vec::new(),
            document_types: Vec::new(),
        }
    }

    pub fn with_metadata(self, id: i64, metadata: UpstreamDocumentMetadata) -> Self {
        self.metadata.lock().expect("metadata lock poisoned").insert(id, metadata);
        self
    }

    pub fn with_reference_data(mut self, tags: Vec<ReferenceItem>, correspondents: Vec<ReferenceItem>, document_types: Vec<ReferenceItem>) -> Self {
        self.tags = tags;
        self.correspondents = correspondents;
        self.document_types = document_types;
        self
    }

    /// Replace a document in place (matched by id), simulating an upstream
    /// edit between two sync runs.
    pub fn replace_document(&self, updated: UpstreamDocument) {
        let mut docs = self.documents.lock().expect("documents lock poisoned");
        if let Some(slot) = docs.iter_mut().find(|d| d.id == updated.id) {
            *slot = updated;
        } else {
            docs.push(updated);
        }
    }

    /// Append a new document to the served corpus.
    pub fn add_document(&self, doc: UpstreamDocument) {
        self.documents.lock().expect("documents lock poisoned").push(doc);
    }

    /// Replace the entire served corpus.
    pub fn set_documents(&self, docs: Vec<UpstreamDocument>) {
        *self.documents.lock().expect("documents lock poisoned") = docs;
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    async fn get_statistics(&self) -> Result<Statistics, UpstreamError> {
        let docs = self.documents.lock().expect("documents lock poisoned");
        Ok(Statistics {
            documents_total: docs.len() as u64,
            character_count: docs.iter().map(|d| d.content.len() as u64).sum(),
        })
    }

    async fn list_documents(&self, page: u32, page_size: u32) -> Result<Page<UpstreamDocument>, UpstreamError> {
        let docs = self.documents.lock().expect("documents lock poisoned");
        // The real backend orders by -modified; the mock expects the
        // caller to have constructed its fixture already in that order, but
        // we sort defensively so tests that mutate the corpus mid-run stay
        // correct without re-deriving the order by hand.
        let mut sorted: Vec<UpstreamDocument> = docs.clone();
        sorted.sort_by(|a, b| b.modified.cmp(&a.modified));

        let start = (page.saturating_sub(1) as usize) * page_size as usize;
        let end = (start + page_size as usize).min(sorted.len());
        let results = if start < sorted.len() {
            sorted[start..end].to_vec()
        } else {
            Vec::new()
        };
        let has_next = end < sorted.len();
        Ok(Page {
            count: sorted.len() as u64,
            next: has_next.then(|| format!("page={}", page + 1)),
            previous: None,
            results,
        })
    }

    async fn get_document(&self, id: i64) -> Result<UpstreamDocument, UpstreamError> {
        self.documents
            .lock()
            .expect("documents lock poisoned")
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| UpstreamError::ClientError {
                status: 404,
                body: format!("document {id} not found"),
            })
    }

    async fn get_document_metadata(&self, id: i64) -> Result<UpstreamDocumentMetadata, UpstreamError> {
        Ok(self
            .metadata
            .lock()
            .expect("metadata lock poisoned")
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_tags(&self) -> Result<Vec<ReferenceItem>, UpstreamError> {
        Ok(self.tags.clone())
    }

    async fn list_correspondents(&self) -> Result<Vec<ReferenceItem>, UpstreamError> {
        Ok(self.correspondents.clone())
    }

    async fn list_document_types(&self) -> Result<Vec<ReferenceItem>, UpstreamError> {
        Ok(self.document_types.clone())
    }

    async fn delete_document(&self, _id: i64) -> Result<(), UpstreamError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: i64) -> UpstreamDocument {
        UpstreamDocument {
            id,
            title: format!("doc-{id}"),
            content: "hello world".to_string(),
            tags: vec![],
            correspondent: None,
            document_type: None,
            created: None,
            modified: None,
            added: None,
            original_file_name: None,
        }
    }

    #[tokio::test]
    async fn list_documents_paginates() {
        let client = MockUpstreamClient::new((1..=5).map(doc).collect());
        let page1 = client.list_documents(1, 2).await.unwrap();
        assert_eq!(page1.results.len(), 2);
        assert!(page1.next.is_some());

        let page3 = client.list_documents(3, 2).await.unwrap();
        assert_eq!(page3.results.len(), 1);
        assert!(page3.next.is_none());
    }

    #[tokio::test]
    async fn get_document_missing_id_is_client_error() {
        let client = MockUpstreamClient::new(vec![doc(1)]);
        let err = client.get_document(999).await.unwrap_err();
        assert!(matches!(err, UpstreamError::ClientError { status: 404, .. }));
    }
}
