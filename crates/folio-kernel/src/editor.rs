//! Inline field editing with debounced saves.
//!
//! Every keystroke-level change lands in a local copy of the block's fields
//! at once, so previews never wait on the network. Changes are coalesced per
//! block and written with a single `update_fields` call once the block has
//! been quiet for the configured period (800ms by default).
//!
//! ```text
//! on_field_change ─► local copy ─► pending[block] ─► (re)arm timer
//!                                                        │ quiet period
//!                                                        ▼
//!                                        service.update_fields(pending)
//! ```
//!
//! Dropping the editor, or closing a block, cancels armed timers without
//! flushing. Use [`InlineEditor::flush`] for an explicit save.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::AbortHandle;

use folio_blocks::{BlockError, ErrorKind};
use folio_types::{BlockId, BlockInstance, FieldData, FieldMap};

use crate::service::{OpFailure, SharedBlockService};

/// Default quiet period before pending changes are saved.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(800);

/// Save status of one block, for the unsaved indicator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Local fields match what the backend last accepted.
    Synced,
    /// Changes are waiting for the quiet period or an in-flight save.
    Pending,
    /// The last save failed; local changes are kept and retried on the next
    /// save. Carries the failure notice.
    Unsaved(String),
}

struct Timer {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct EditorState {
    local: HashMap<BlockId, FieldData>,
    pending: HashMap<BlockId, FieldMap>,
    timers: HashMap<BlockId, Timer>,
    status: HashMap<BlockId, SyncState>,
    generation: u64,
}

/// Debounced field editor over a shared [`BlockService`](crate::BlockService).
pub struct InlineEditor {
    service: SharedBlockService,
    quiet_period: Duration,
    state: Arc<Mutex<EditorState>>,
}

impl InlineEditor {
    pub fn new(service: SharedBlockService, quiet_period: Duration) -> Self {
        Self {
            service,
            quiet_period,
            state: Arc::new(Mutex::new(EditorState::default())),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Start editing a block. Re-opening a block keeps its local copy.
    pub fn open(&self, block: &BlockInstance) {
        self.state
            .lock()
            .local
            .entry(block.id)
            .or_insert_with(|| block.fields.clone());
    }

    /// Stop editing a block. An armed save is cancelled, not flushed.
    pub fn close(&self, id: BlockId) {
        let mut state = self.state.lock();
        if let Some(timer) = state.timers.remove(&id) {
            timer.handle.abort();
        }
        state.pending.remove(&id);
        state.local.remove(&id);
        state.status.remove(&id);
    }

    /// Local fields of an open block, including unsaved changes.
    pub fn local_fields(&self, id: BlockId) -> Option<FieldData> {
        self.state.lock().local.get(&id).cloned()
    }

    pub fn sync_state(&self, id: BlockId) -> SyncState {
        self.state
            .lock()
            .status
            .get(&id)
            .cloned()
            .unwrap_or(SyncState::Synced)
    }

    /// Fields changed locally and not yet sent.
    pub fn pending_fields(&self, id: BlockId) -> Option<FieldMap> {
        self.state.lock().pending.get(&id).cloned()
    }

    /// Record a change to one field of an open block.
    ///
    /// The value is validated against the block's schema and applied locally
    /// right away. The save is deferred until the block has been quiet for
    /// the quiet period; each change restarts the wait.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_field_change(&self, id: BlockId, field: &str, value: Value) -> Result<(), BlockError> {
        let mut state = self.state.lock();
        let local = state.local.get_mut(&id).ok_or(BlockError::BlockNotFound(id))?;
        local.set_field(field, value.clone())?;

        state
            .pending
            .entry(id)
            .or_default()
            .insert(field.to_string(), value);
        state.status.insert(id, SyncState::Pending);
        self.arm(&mut state, id);
        Ok(())
    }

    /// Save a block's pending changes now.
    pub async fn flush(&self, id: BlockId) -> Result<(), OpFailure> {
        if let Some(timer) = self.state.lock().timers.remove(&id) {
            timer.handle.abort();
        }
        flush_block(&self.state, &self.service, id).await
    }

    /// Save every open block with pending changes. Returns the first failure
    /// after attempting all of them.
    pub async fn flush_all(&self) -> Result<(), OpFailure> {
        let ids: Vec<BlockId> = self.state.lock().pending.keys().copied().collect();
        let mut first_error = None;
        for id in ids {
            if let Err(e) = self.flush(id).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn arm(&self, state: &mut EditorState, id: BlockId) {
        state.generation += 1;
        let generation = state.generation;

        let shared = self.state.clone();
        let service = self.service.clone();
        let quiet_period = self.quiet_period;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            {
                let mut state = shared.lock();
                match state.timers.get(&id) {
                    Some(timer) if timer.generation == generation => {
                        state.timers.remove(&id);
                    }
                    _ => return,
                }
            }
            if let Err(e) = flush_block(&shared, &service, id).await {
                tracing::warn!(block = ?id, error = %e.source, "{}", e.notice());
            }
        })
        .abort_handle();

        if let Some(previous) = state.timers.insert(id, Timer { generation, handle }) {
            previous.handle.abort();
        }
    }
}

impl Drop for InlineEditor {
    fn drop(&mut self) {
        for (_, timer) in self.state.lock().timers.drain() {
            timer.handle.abort();
        }
    }
}

async fn flush_block(
    state: &Mutex<EditorState>,
    service: &SharedBlockService,
    id: BlockId,
) -> Result<(), OpFailure> {
    let pending = match state.lock().pending.remove(&id) {
        Some(pending) if !pending.is_empty() => pending,
        _ => return Ok(()),
    };

    tracing::debug!(block = ?id, fields = pending.len(), "saving block fields");
    let result = service.lock().await.update_fields(id, pending.clone()).await;

    let mut state = state.lock();
    match &result {
        Ok(()) => {
            if !state.pending.contains_key(&id) {
                state.status.insert(id, SyncState::Synced);
            }
        }
        Err(failure) if failure.kind() == ErrorKind::NotFound => {
            if let Some(timer) = state.timers.remove(&id) {
                timer.handle.abort();
            }
            state.pending.remove(&id);
            state.local.remove(&id);
            state.status.remove(&id);
        }
        Err(failure) => {
            if failure.kind() == ErrorKind::Transport {
                // Newer edits made during the call win over the failed ones.
                let queued = state.pending.entry(id).or_default();
                for (field, value) in pending {
                    queued.entry(field).or_insert(value);
                }
            }
            state
                .status
                .insert(id, SyncState::Unsaved(failure.notice().to_string()));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BlockBackend, MemoryBackend};
    use crate::service::BlockService;
    use folio_blocks::BlockOpKind;
    use folio_types::{BlockType, DocumentId};
    use serde_json::json;

    async fn setup() -> (Arc<MemoryBackend>, DocumentId, BlockInstance, InlineEditor) {
        let backend = Arc::new(MemoryBackend::new());
        let doc = DocumentId::new();
        let mut service = BlockService::new(doc, backend.clone());
        let intro = service.add(BlockType::Introduction).await.unwrap();
        let editor = InlineEditor::new(service.into_shared(), DEFAULT_QUIET_PERIOD);
        editor.open(&intro);
        (backend, doc, intro, editor)
    }

    async fn saved(backend: &MemoryBackend, doc: DocumentId) -> FieldData {
        backend.list(doc).await.unwrap().remove(0).fields
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_coalesce_into_one_save() {
        let (backend, doc, intro, editor) = setup().await;

        editor.on_field_change(intro.id, "title", json!("H")).unwrap();
        tokio::time::sleep(ms(300)).await;
        editor.on_field_change(intro.id, "title", json!("Hello")).unwrap();
        tokio::time::sleep(ms(300)).await;
        editor.on_field_change(intro.id, "body", json!("Welcome")).unwrap();

        assert_eq!(
            editor.local_fields(intro.id).unwrap().get("title"),
            Some(json!("Hello"))
        );
        assert_eq!(editor.sync_state(intro.id), SyncState::Pending);

        tokio::time::sleep(ms(799)).await;
        assert_eq!(backend.op_count(doc, BlockOpKind::UpdateFields), 0);

        tokio::time::sleep(ms(50)).await;
        assert_eq!(backend.op_count(doc, BlockOpKind::UpdateFields), 1);
        let fields = saved(&backend, doc).await;
        assert_eq!(fields.get("title"), Some(json!("Hello")));
        assert_eq!(fields.get("body"), Some(json!("Welcome")));
        assert_eq!(editor.sync_state(intro.id), SyncState::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_without_saving() {
        let (backend, doc, intro, editor) = setup().await;
        editor.on_field_change(intro.id, "title", json!("draft")).unwrap();
        drop(editor);

        tokio::time::sleep(ms(2000)).await;
        assert_eq!(backend.op_count(doc, BlockOpKind::UpdateFields), 0);
        assert_eq!(saved(&backend, doc).await.get("title"), Some(json!("")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_save() {
        let (backend, doc, intro, editor) = setup().await;
        editor.on_field_change(intro.id, "title", json!("draft")).unwrap();
        editor.close(intro.id);

        tokio::time::sleep(ms(2000)).await;
        assert_eq!(backend.op_count(doc, BlockOpKind::UpdateFields), 0);
        assert!(editor.local_fields(intro.id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_flush_saves_once() {
        let (backend, doc, intro, editor) = setup().await;
        editor.on_field_change(intro.id, "title", json!("Now")).unwrap();
        editor.flush(intro.id).await.unwrap();
        assert_eq!(backend.op_count(doc, BlockOpKind::UpdateFields), 1);
        assert_eq!(editor.sync_state(intro.id), SyncState::Synced);

        tokio::time::sleep(ms(2000)).await;
        assert_eq!(backend.op_count(doc, BlockOpKind::UpdateFields), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_marks_unsaved_and_retries() {
        let (backend, doc, intro, editor) = setup().await;
        backend.fail_next(BlockOpKind::UpdateFields);

        editor.on_field_change(intro.id, "title", json!("Kept")).unwrap();
        tokio::time::sleep(ms(900)).await;
        assert_eq!(
            editor.sync_state(intro.id),
            SyncState::Unsaved("Failed to update block".into())
        );
        assert_eq!(
            editor.local_fields(intro.id).unwrap().get("title"),
            Some(json!("Kept"))
        );
        assert_eq!(editor.pending_fields(intro.id).unwrap().len(), 1);

        editor.flush(intro.id).await.unwrap();
        assert_eq!(saved(&backend, doc).await.get("title"), Some(json!("Kept")));
        assert_eq!(editor.sync_state(intro.id), SyncState::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_value_rejected_locally() {
        let (_backend, _doc, intro, editor) = setup().await;
        let err = editor.on_field_change(intro.id, "title", json!(7)).unwrap_err();
        assert!(err.is_validation());
        assert!(editor.pending_fields(intro.id).is_none());
        assert_eq!(editor.sync_state(intro.id), SyncState::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_to_unopened_block() {
        let (_backend, _doc, _intro, editor) = setup().await;
        let err = editor
            .on_field_change(BlockId::new(), "title", json!("x"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all() {
        let backend = Arc::new(MemoryBackend::new());
        let doc = DocumentId::new();
        let mut service = BlockService::new(doc, backend.clone());
        let a = service.add(BlockType::Hero).await.unwrap();
        let b = service.add(BlockType::Footer).await.unwrap();
        let editor = InlineEditor::new(service.into_shared(), DEFAULT_QUIET_PERIOD);
        editor.open(&a);
        editor.open(&b);

        editor.on_field_change(a.id, "headline", json!("A")).unwrap();
        editor.on_field_change(b.id, "companyName", json!("B Corp")).unwrap();
        editor.flush_all().await.unwrap();
        assert_eq!(backend.op_count(doc, BlockOpKind::UpdateFields), 2);
    }
}
