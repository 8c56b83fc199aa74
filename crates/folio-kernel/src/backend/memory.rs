//! In-memory block backend.
//!
//! Used for tests and previews. All data is lost when dropped.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use folio_blocks::{BlockError, BlockOp, BlockOpKind, BlockStore, Result};
use folio_types::{BlockId, BlockInstance, DocumentId, FieldData, FieldMap};

use super::BlockBackend;

/// In-memory backend holding one [`BlockStore`] per document.
///
/// Thread-safe via `DashMap` (per-document locking) and `parking_lot` for the
/// op history. Failures can be injected to exercise caller recovery paths.
#[derive(Default)]
pub struct MemoryBackend {
    documents: DashMap<DocumentId, BlockStore>,
    /// Applied operations, in order, per document.
    history: RwLock<Vec<(DocumentId, BlockOp)>>,
    /// One-shot transport failures, consumed by the next matching call.
    injected: Mutex<Vec<BlockOpKind>>,
    /// When set, every call fails with a transport error.
    offline: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `kind` fail with a transport error.
    pub fn fail_next(&self, kind: BlockOpKind) {
        self.injected.lock().push(kind);
    }

    /// Simulate the collaborator being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Operations applied to `document`, oldest first.
    pub fn history(&self, document: DocumentId) -> Vec<BlockOp> {
        self.history
            .read()
            .iter()
            .filter(|(doc, _)| *doc == document)
            .map(|(_, op)| op.clone())
            .collect()
    }

    /// Number of calls of `kind` that reached storage for `document`.
    pub fn op_count(&self, document: DocumentId, kind: BlockOpKind) -> usize {
        self.history
            .read()
            .iter()
            .filter(|(doc, op)| *doc == document && op.kind() == kind)
            .count()
    }

    fn check(&self, kind: BlockOpKind) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BlockError::transport("backend offline"));
        }
        let mut injected = self.injected.lock();
        if let Some(pos) = injected.iter().position(|k| *k == kind) {
            injected.remove(pos);
            return Err(BlockError::transport(format!("injected {kind} failure")));
        }
        Ok(())
    }

    fn record(&self, document: DocumentId, op: BlockOp) {
        self.history.write().push((document, op));
    }
}

#[async_trait]
impl BlockBackend for MemoryBackend {
    async fn list(&self, document: DocumentId) -> Result<Vec<BlockInstance>> {
        self.check(BlockOpKind::List)?;
        Ok(self
            .documents
            .get(&document)
            .map(|store| store.list())
            .unwrap_or_default())
    }

    async fn add(&self, document: DocumentId, fields: FieldData) -> Result<BlockInstance> {
        self.check(BlockOpKind::Add)?;
        let block = self
            .documents
            .entry(document)
            .or_insert_with(|| BlockStore::new(document))
            .insert(fields);
        self.record(document, BlockOp::Add { block: block.to_record() });
        Ok(block)
    }

    async fn update(&self, document: DocumentId, id: BlockId, fields: &FieldMap) -> Result<()> {
        self.check(BlockOpKind::UpdateFields)?;
        {
            let mut store = self
                .documents
                .get_mut(&document)
                .ok_or(BlockError::BlockNotFound(id))?;
            store.update_fields(&id, fields)?;
        }
        self.record(
            document,
            BlockOp::UpdateFields {
                id,
                fields: fields.clone(),
            },
        );
        Ok(())
    }

    async fn delete(&self, document: DocumentId, id: BlockId) -> Result<()> {
        self.check(BlockOpKind::Delete)?;
        {
            let mut store = self
                .documents
                .get_mut(&document)
                .ok_or(BlockError::BlockNotFound(id))?;
            store.delete(&id)?;
        }
        self.record(document, BlockOp::Delete { id });
        Ok(())
    }

    async fn reorder(&self, document: DocumentId, ordered_ids: &[BlockId]) -> Result<()> {
        self.check(BlockOpKind::Reorder)?;
        {
            let mut store = self
                .documents
                .entry(document)
                .or_insert_with(|| BlockStore::new(document));
            store.reorder(ordered_ids)?;
        }
        self.record(
            document,
            BlockOp::Reorder {
                ordered_ids: ordered_ids.to_vec(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_blocks::registry::default_field_data;
    use folio_types::BlockType;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_list_and_history() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        let a = backend.add(doc, default_field_data(BlockType::Hero)).await.unwrap();
        let b = backend.add(doc, default_field_data(BlockType::Footer)).await.unwrap();

        let list = backend.list(doc).await.unwrap();
        assert_eq!(list.iter().map(|x| x.id).collect::<Vec<_>>(), [a.id, b.id]);
        assert_eq!(backend.op_count(doc, BlockOpKind::Add), 2);
        assert!(backend.list(DocumentId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_documents_are_isolated() {
        let backend = MemoryBackend::new();
        let doc1 = DocumentId::new();
        let doc2 = DocumentId::new();
        let a = backend.add(doc1, default_field_data(BlockType::Hero)).await.unwrap();

        let err = backend.delete(doc2, a.id).await.unwrap_err();
        assert!(err.is_not_found());
        let err = backend.reorder(doc2, &[a.id]).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.list(doc1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        let block = backend.add(doc, default_field_data(BlockType::Introduction)).await.unwrap();
        let fields = json!({"title": "Hi"}).as_object().cloned().unwrap();
        backend.update(doc, block.id, &fields).await.unwrap();

        let list = backend.list(doc).await.unwrap();
        assert_eq!(list[0].fields.get("title"), Some(json!("Hi")));
        assert_eq!(list[0].fields.get("body"), Some(json!("")));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        backend.fail_next(BlockOpKind::Add);

        let err = backend.add(doc, default_field_data(BlockType::Hero)).await.unwrap_err();
        assert!(err.is_transport());
        assert!(backend.list(doc).await.unwrap().is_empty());
        assert!(backend.add(doc, default_field_data(BlockType::Hero)).await.is_ok());
    }

    #[tokio::test]
    async fn test_offline() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        assert!(backend.list(DocumentId::new()).await.unwrap_err().is_transport());
        backend.set_offline(false);
        assert!(backend.list(DocumentId::new()).await.is_ok());
    }
}
