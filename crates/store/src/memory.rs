use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::model::{
    group_key, Document, DocumentContent, DocumentSignature, DuplicateGroupMember, GroupWithMembers,
    ProcessingStatus, SyncState,
};

/// An in-memory store backed by `RwLock<HashMap>` tables. Useful for tests
/// and the demo binary; not durable across process restarts.
#[derive(Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, Document>>,
    contents: RwLock<HashMap<String, DocumentContent>>,
    signatures: RwLock<HashMap<String, DocumentSignature>>,
    groups: RwLock<HashMap<String, GroupWithMembers>>,
    sync_state: RwLock<SyncState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_id_by_upstream(&self, upstream_id: i64) -> Option<String> {
        self.documents
            .read()
            .expect("documents lock poisoned")
            .values()
            .find(|d| d.upstream_id == upstream_id)
            .map(|d| d.id.clone())
    }
}

impl crate::Store for InMemoryStore {
    fn get_document_by_upstream_id(&self, upstream_id: i64) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .expect("documents lock poisoned")
            .values()
            .find(|d| d.upstream_id == upstream_id)
            .cloned())
    }

    fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().expect("documents lock poisoned").get(document_id).cloned())
    }

    fn list_documents(&self, only_pending: bool) -> Result<Vec<Document>, StoreError> {
        let guard = self.documents.read().expect("documents lock poisoned");
        Ok(guard
            .values()
            .filter(|d| !only_pending || d.processing_status == ProcessingStatus::Pending)
            .cloned()
            .collect())
    }

    fn insert_document(&self, document: &Document, content: &DocumentContent) -> Result<(), StoreError> {
        if self.find_id_by_upstream(document.upstream_id).is_some() {
            return Err(StoreError::Constraint(format!(
                "upstream_id {} already exists",
                document.upstream_id
            )));
        }
        self.documents
            .write()
            .expect("documents lock poisoned")
            .insert(document.id.clone(), document.clone());
        self.contents
            .write()
            .expect("contents lock poisoned")
            .insert(content.document_id.clone(), content.clone());
        Ok(())
    }

    fn update_document(&self, document: &Document, content: &DocumentContent) -> Result<(), StoreError> {
        self.documents
            .write()
            .expect("documents lock poisoned")
            .insert(document.id.clone(), document.clone());
        self.contents
            .write()
            .expect("contents lock poisoned")
            .insert(content.document_id.clone(), content.clone());
        Ok(())
    }

    fn patch_file_sizes(
        &self,
        document_id: &str,
        original_file_size: Option<u64>,
        archive_file_size: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut guard = self.documents.write().expect("documents lock poisoned");
        match guard.get_mut(document_id) {
            Some(doc) => {
                doc.original_file_size = original_file_size;
                doc.archive_file_size = archive_file_size;
                Ok(())
            }
            None => Err(StoreError::NotFound(document_id.to_string())),
        }
    }

    fn purge_all_documents(&self) -> Result<(), StoreError> {
        self.documents.write().expect("documents lock poisoned").clear();
        self.contents.write().expect("contents lock poisoned").clear();
        self.signatures.write().expect("signatures lock poisoned").clear();
        self.groups.write().expect("groups lock poisoned").clear();
        Ok(())
    }

    fn get_content(&self, document_id: &str) -> Result<Option<DocumentContent>, StoreError> {
        Ok(self.contents.read().expect("contents lock poisoned").get(document_id).cloned())
    }

    fn get_signature(&self, document_id: &str) -> Result<Option<DocumentSignature>, StoreError> {
        Ok(self
            .signatures
            .read()
            .expect("signatures lock poisoned")
            .get(document_id)
            .cloned())
    }

    fn save_signature(&self, signature: &DocumentSignature) -> Result<(), StoreError> {
        self.signatures
            .write()
            .expect("signatures lock poisoned")
            .insert(signature.document_id.clone(), signature.clone());
        Ok(())
    }

    fn list_signatures(&self, num_permutations: usize) -> Result<Vec<DocumentSignature>, StoreError> {
        Ok(self
            .signatures
            .read()
            .expect("signatures lock poisoned")
            .values()
            .filter(|s| s.num_permutations == num_permutations)
            .cloned()
            .collect())
    }

    fn delete_signature(&self, document_id: &str) -> Result<(), StoreError> {
        self.signatures.write().expect("signatures lock poisoned").remove(document_id);
        Ok(())
    }

    fn mark_completed(&self, document_ids: &[String]) -> Result<(), StoreError> {
        let mut guard = self.documents.write().expect("documents lock poisoned");
        for id in document_ids {
            if let Some(doc) = guard.get_mut(id) {
                doc.processing_status = ProcessingStatus::Completed;
            }
        }
        Ok(())
    }

    fn get_sync_state(&self) -> Result<SyncState, StoreError> {
        Ok(self.sync_state.read().expect("sync_state lock poisoned").clone())
    }

    fn save_sync_state(&self, state: &SyncState) -> Result<(), StoreError> {
        *self.sync_state.write().expect("sync_state lock poisoned") = state.clone();
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<GroupWithMembers>, StoreError> {
        Ok(self.groups.read().expect("groups lock poisoned").values().cloned().collect())
    }

    fn reconcile_groups(
        &self,
        to_update: &[GroupWithMembers],
        to_create: &[GroupWithMembers],
        to_delete_ids: &[String],
    ) -> Result<(), StoreError> {
        // The whole point of this method is atomicity; a single write lock
        // held for the duration of all three mutations gives readers only
        // the pre- or post-reconciliation view, never a partial one.
        let mut guard = self.groups.write().expect("groups lock poisoned");
        for group in to_update {
            guard.insert(group.group.id.clone(), group.clone());
        }
        for group in to_create {
            guard.insert(group.group.id.clone(), group.clone());
        }
        for id in to_delete_ids {
            guard.remove(id);
        }
        Ok(())
    }
}

/// Build a group's reconciliation key directly from its member rows,
/// without needing to go through [`GroupWithMembers::member_key`] first —
/// convenient when assembling candidate groups before they're wrapped.
pub fn member_key_of(members: &[DuplicateGroupMember]) -> String {
    group_key(members.iter().map(|m| m.document_id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, DocumentContent, ProcessingStatus};
    use crate::Store;
    use chrono::Utc;

    fn doc(id: &str, upstream_id: i64) -> (Document, DocumentContent) {
        (
            Document {
                id: id.to_string(),
                upstream_id,
                title: "title".to_string(),
                correspondent: None,
                document_type: None,
                tags: vec![],
                created: None,
                added: None,
                modified: None,
                original_file_size: None,
                archive_file_size: None,
                original_file_name: None,
                fingerprint: Some("abc".to_string()),
                processing_status: ProcessingStatus::Pending,
                synced_at: Some(Utc::now()),
            },
            DocumentContent {
                document_id: id.to_string(),
                full_text: "hello world".to_string(),
                normalized_text: "hello world".to_string(),
                word_count: 2,
                content_hash: "deadbeef".to_string(),
            },
        )
    }

    #[test]
    fn insert_then_lookup_by_upstream_id() {
        let store = InMemoryStore::new();
        let (d, c) = doc("doc-1", 42);
        store.insert_document(&d, &c).unwrap();
        let found = store.get_document_by_upstream_id(42).unwrap().unwrap();
        assert_eq!(found.id, "doc-1");
    }

    #[test]
    fn duplicate_upstream_id_is_a_constraint_error() {
        let store = InMemoryStore::new();
        let (d1, c1) = doc("doc-1", 42);
        let (d2, c2) = doc("doc-2", 42);
        store.insert_document(&d1, &c1).unwrap();
        assert!(matches!(store.insert_document(&d2, &c2), Err(StoreError::Constraint(_))));
    }

    #[test]
    fn patch_file_sizes_updates_only_those_fields() {
        let store = InMemoryStore::new();
        let (d, c) = doc("doc-1", 1);
        store.insert_document(&d, &c).unwrap();
        store.patch_file_sizes("doc-1", Some(100), Some(50)).unwrap();
        let found = store.get_document("doc-1").unwrap().unwrap();
        assert_eq!(found.original_file_size, Some(100));
        assert_eq!(found.archive_file_size, Some(50));
        assert_eq!(found.title, "title");
    }

    #[test]
    fn mark_completed_flips_processing_status() {
        let store = InMemoryStore::new();
        let (d, c) = doc("doc-1", 1);
        store.insert_document(&d, &c).unwrap();
        store.mark_completed(&["doc-1".to_string()]).unwrap();
        let found = store.get_document("doc-1").unwrap().unwrap();
        assert_eq!(found.processing_status, ProcessingStatus::Completed);
    }

    #[test]
    fn purge_clears_all_tables() {
        let store = InMemoryStore::new();
        let (d, c) = doc("doc-1", 1);
        store.insert_document(&d, &c).unwrap();
        store.purge_all_documents().unwrap();
        assert!(store.list_documents(false).unwrap().is_empty());
    }

    #[test]
    fn list_documents_only_pending_filters_completed() {
        let store = InMemoryStore::new();
        let (d1, c1) = doc("doc-1", 1);
        let (d2, c2) = doc("doc-2", 2);
        store.insert_document(&d1, &c1).unwrap();
        store.insert_document(&d2, &c2).unwrap();
        store.mark_completed(&["doc-1".to_string()]).unwrap();

        let pending = store.list_documents(true).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "doc-2");
    }

    #[test]
    fn delete_signature_removes_only_the_named_document() {
        let store = InMemoryStore::new();
        let sig_a = DocumentSignature {
            document_id: "doc-a".to_string(),
            minhash_signature: vec![1, 2, 3, 4],
            algorithm_version: "v1".to_string(),
            num_permutations: 2,
            created_at: Utc::now(),
        };
        let sig_b = DocumentSignature {
            document_id: "doc-b".to_string(),
            ..sig_a.clone()
        };
        store.save_signature(&sig_a).unwrap();
        store.save_signature(&sig_b).unwrap();

        store.delete_signature("doc-a").unwrap();
        assert!(store.get_signature("doc-a").unwrap().is_none());
        assert!(store.get_signature("doc-b").unwrap().is_some());

        // deleting an absent signature is a no-op, not an error
        store.delete_signature("doc-a").unwrap();
    }

    #[test]
    fn sync_state_round_trips() {
        let store = InMemoryStore::new();
        let mut state = store.get_sync_state().unwrap();
        assert_eq!(state.total_documents, 0);
        state.total_documents = 5;
        store.save_sync_state(&state).unwrap();
        assert_eq!(store.get_sync_state().unwrap().total_documents, 5);
    }
}
