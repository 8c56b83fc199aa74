//! Block service: one document's blocks, kept in sync with a backend.
//!
//! The service owns a cached, sorted view of the document and applies every
//! mutation to it optimistically before the backend call resolves. Readers
//! hold a [`BlockView`] handle and see the optimistic state while a call is in
//! flight. On failure:
//!
//! | Op            | Transport failure                | Not found              |
//! |---------------|----------------------------------|------------------------|
//! | list          | keep cached view, mark stale     | -                      |
//! | add           | roll back                        | -                      |
//! | update_fields | keep local value, mark unsynced  | drop block from view   |
//! | delete        | roll back                        | drop block from view   |
//! | reorder/move  | roll back                        | roll back              |
//!
//! Validation errors are raised before anything is dispatched. Structural
//! operations take `&mut self`, so at most one is in flight per service;
//! share a service between tasks as a [`SharedBlockService`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

use folio_blocks::{
    order, resolve_defaults, BlockError, BlockOpKind, Direction, ErrorKind,
};
use folio_types::{BlockId, BlockInstance, BlockType, DocumentId, FieldMap, Template, TemplateId};

use crate::backend::SharedBackend;
use crate::templates::TemplateSource;

/// A block service shared between tasks (editor timers, UI handlers).
pub type SharedBlockService = Arc<tokio::sync::Mutex<BlockService>>;

/// A failed service operation.
///
/// Displays as the operation-scoped notice ("Failed to add block"); the
/// underlying [`BlockError`] is the source.
#[derive(Debug, Clone, Error)]
#[error("{}", .op.failure_message())]
pub struct OpFailure {
    pub op: BlockOpKind,
    pub source: BlockError,
}

impl OpFailure {
    pub fn new(op: BlockOpKind, source: BlockError) -> Self {
        Self { op, source }
    }

    /// User-facing notice for this failure.
    pub fn notice(&self) -> &'static str {
        self.op.failure_message()
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Events broadcast after the backend acknowledges a change.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockEvent {
    /// The view was replaced from the backend.
    Loaded { count: usize },
    Added { block_id: BlockId, block_type: String },
    Updated { block_id: BlockId },
    Deleted { block_id: BlockId },
    Reordered,
}

/// Result of [`BlockService::list`].
#[derive(Clone, Debug, PartialEq)]
pub struct ListView {
    /// Blocks in ascending `sort_order`.
    pub blocks: Vec<BlockInstance>,
    /// True when the backend could not be reached and `blocks` is the last
    /// known state.
    pub stale: bool,
}

#[derive(Debug, Default)]
struct ViewState {
    blocks: Vec<BlockInstance>,
    stale: bool,
    /// Fields the backend has not accepted yet, per block. Sent again with
    /// the block's next update.
    unsynced: HashMap<BlockId, FieldMap>,
}

/// Read handle onto a service's cached block list.
#[derive(Clone, Debug, Default)]
pub struct BlockView {
    inner: Arc<RwLock<ViewState>>,
}

impl BlockView {
    /// Blocks in ascending `sort_order`, including optimistic changes.
    pub fn blocks(&self) -> Vec<BlockInstance> {
        self.inner.read().blocks.clone()
    }

    pub fn get(&self, id: BlockId) -> Option<BlockInstance> {
        self.inner.read().blocks.iter().find(|b| b.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().blocks.is_empty()
    }

    /// Whether the last load failed and the view may be out of date.
    pub fn is_stale(&self) -> bool {
        self.inner.read().stale
    }

    /// Whether a block has local field edits the backend has not accepted.
    pub fn is_unsynced(&self, id: BlockId) -> bool {
        self.inner.read().unsynced.contains_key(&id)
    }

    /// Local field values not yet accepted by the backend.
    pub fn unsynced_fields(&self, id: BlockId) -> Option<FieldMap> {
        self.inner.read().unsynced.get(&id).cloned()
    }

    fn ordered_ids(&self) -> Vec<BlockId> {
        self.inner.read().blocks.iter().map(|b| b.id).collect()
    }

    fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        f(&mut self.inner.write())
    }

    fn restore(&self, blocks: Vec<BlockInstance>) {
        self.inner.write().blocks = blocks;
    }
}

/// Block operations for one document.
pub struct BlockService {
    document: DocumentId,
    backend: SharedBackend,
    template: Option<Template>,
    view: BlockView,
    event_tx: broadcast::Sender<BlockEvent>,
}

impl BlockService {
    /// Create a service with an empty view. Call [`list`](Self::list) to load.
    pub fn new(document: DocumentId, backend: SharedBackend) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            document,
            backend,
            template: None,
            view: BlockView::default(),
            event_tx,
        }
    }

    /// Use `template` for new-block defaults and the type picker.
    pub fn with_template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    /// Create a service, fetch its template, and load the block list.
    ///
    /// A template that cannot be fetched is logged and skipped; a failed
    /// initial load leaves the view empty and stale.
    pub async fn open(
        document: DocumentId,
        backend: SharedBackend,
        templates: &dyn TemplateSource,
        template_id: Option<TemplateId>,
    ) -> Result<Self, OpFailure> {
        let mut service = Self::new(document, backend);
        if let Some(template_id) = template_id {
            match templates.template(template_id).await {
                Ok(Some(template)) => service.template = Some(template),
                Ok(None) => {
                    tracing::warn!(template = %template_id, "template not found, using registry defaults")
                }
                Err(e) => {
                    tracing::warn!(template = %template_id, error = %e, "template unavailable, using registry defaults")
                }
            }
        }
        service.list().await?;
        Ok(service)
    }

    /// Wrap in a mutex for sharing with an editor or other tasks.
    pub fn into_shared(self) -> SharedBlockService {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn document_id(&self) -> DocumentId {
        self.document
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    /// A read handle onto the cached view.
    pub fn view(&self) -> BlockView {
        self.view.clone()
    }

    /// Cached blocks in ascending `sort_order`.
    pub fn blocks(&self) -> Vec<BlockInstance> {
        self.view.blocks()
    }

    /// Subscribe to acknowledged changes.
    pub fn subscribe(&self) -> broadcast::Receiver<BlockEvent> {
        self.event_tx.subscribe()
    }

    /// Block types the picker should offer.
    ///
    /// With a template, this is the types enabled in its enabled zones. With
    /// no template, or a template that enables nothing, every registered type.
    pub fn offerable_block_types(&self) -> Vec<BlockType> {
        self.template
            .as_ref()
            .map(Template::offerable_block_types)
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| BlockType::ALL.to_vec())
    }

    fn emit(&self, event: BlockEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Reload the view from the backend.
    ///
    /// A transport failure is recovered: the cached blocks come back marked
    /// stale. Local edits that have not been accepted yet survive a reload.
    #[tracing::instrument(skip(self), fields(document = %self.document))]
    pub async fn list(&mut self) -> Result<ListView, OpFailure> {
        match self.backend.list(self.document).await {
            Ok(mut blocks) => {
                order::sort_blocks(&mut blocks);
                let count = blocks.len();
                self.view.update(move |state| {
                    for block in blocks.iter_mut() {
                        let Some(outstanding) = state.unsynced.get(&block.id) else {
                            continue;
                        };
                        if let Err(e) = block.fields.merge(outstanding) {
                            tracing::warn!(block = ?block.id, error = %e, "unsaved fields no longer fit the stored block");
                        }
                    }
                    state.unsynced.retain(|id, _| blocks.iter().any(|b| b.id == *id));
                    state.blocks = blocks;
                    state.stale = false;
                });
                self.emit(BlockEvent::Loaded { count });
                Ok(ListView {
                    blocks: self.view.blocks(),
                    stale: false,
                })
            }
            Err(e) if e.is_transport() => {
                tracing::warn!(error = %e, "block list unavailable, serving cached view");
                self.view.update(|state| state.stale = true);
                Ok(ListView {
                    blocks: self.view.blocks(),
                    stale: true,
                })
            }
            Err(e) => Err(OpFailure::new(BlockOpKind::List, e)),
        }
    }

    /// Append a block of `block_type` seeded with resolved defaults.
    #[tracing::instrument(skip(self), fields(document = %self.document))]
    pub async fn add(&mut self, block_type: BlockType) -> Result<BlockInstance, OpFailure> {
        let fields = resolve_defaults(block_type, self.template.as_ref());

        let snapshot = self.view.blocks();
        let provisional = BlockInstance::new(
            BlockId::new(),
            order::next_sort_order(&snapshot),
            fields.clone(),
        );
        let provisional_id = provisional.id;
        self.view.update(|state| state.blocks.push(provisional));

        match self.backend.add(self.document, fields).await {
            Ok(block) => {
                let acked = block.clone();
                self.view.update(move |state| {
                    match state.blocks.iter_mut().find(|b| b.id == provisional_id) {
                        Some(slot) => *slot = acked,
                        None => state.blocks.push(acked),
                    }
                    order::sort_blocks(&mut state.blocks);
                });
                tracing::debug!(block = ?block.id, sort_order = block.sort_order, "block added");
                self.emit(BlockEvent::Added {
                    block_id: block.id,
                    block_type: block.type_name().to_string(),
                });
                Ok(block)
            }
            Err(e) => {
                tracing::warn!(error = %e, "add failed, rolling back");
                self.view.restore(snapshot);
                Err(OpFailure::new(BlockOpKind::Add, e))
            }
        }
    }

    /// Add by registry type name. Unknown names are rejected without a call.
    pub async fn add_named(&mut self, type_name: &str) -> Result<BlockInstance, OpFailure> {
        let block_type = BlockType::from_str(type_name).ok_or_else(|| {
            OpFailure::new(
                BlockOpKind::Add,
                BlockError::UnknownBlockType(type_name.to_string()),
            )
        })?;
        self.add(block_type).await
    }

    /// Shallow-merge `partial` into a block's fields.
    ///
    /// The merge is applied locally first. If the backend is unreachable the
    /// local value is kept and the block is marked unsynced. Unsynced fields
    /// ride along with the block's next update, so a later success covers
    /// them too.
    #[tracing::instrument(skip(self, partial), fields(document = %self.document, keys = partial.len()))]
    pub async fn update_fields(&mut self, id: BlockId, partial: FieldMap) -> Result<(), OpFailure> {
        let fail = |e: BlockError| OpFailure::new(BlockOpKind::UpdateFields, e);

        let previous = self.view.get(id);
        if let Some(block) = &previous {
            let mut merged = block.fields.clone();
            merged.merge(&partial).map_err(|e| fail(e.into()))?;
            self.view.update(|state| {
                if let Some(slot) = state.blocks.iter_mut().find(|b| b.id == id) {
                    slot.fields = merged;
                }
            });
        }

        let mut dispatched = self.view.unsynced_fields(id).unwrap_or_default();
        dispatched.extend(partial);

        match self.backend.update(self.document, id, &dispatched).await {
            Ok(()) => {
                self.view.update(|state| state.unsynced.remove(&id));
                self.emit(BlockEvent::Updated { block_id: id });
                Ok(())
            }
            Err(e) if e.is_transport() => {
                tracing::warn!(block = ?id, error = %e, "update not saved, keeping local value");
                self.view.update(move |state| state.unsynced.insert(id, dispatched));
                Err(fail(e))
            }
            Err(e) if e.is_not_found() => {
                self.drop_block(id);
                Err(fail(e))
            }
            Err(e) => {
                if let Some(block) = previous {
                    self.view.update(move |state| {
                        if let Some(slot) = state.blocks.iter_mut().find(|b| b.id == id) {
                            *slot = block;
                        }
                    });
                }
                Err(fail(e))
            }
        }
    }

    /// Remove a block.
    #[tracing::instrument(skip(self), fields(document = %self.document))]
    pub async fn delete(&mut self, id: BlockId) -> Result<(), OpFailure> {
        let snapshot = self.view.blocks();
        self.view.update(|state| state.blocks.retain(|b| b.id != id));

        match self.backend.delete(self.document, id).await {
            Ok(()) => {
                self.view.update(|state| state.unsynced.remove(&id));
                self.emit(BlockEvent::Deleted { block_id: id });
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                self.drop_block(id);
                Err(OpFailure::new(BlockOpKind::Delete, e))
            }
            Err(e) => {
                tracing::warn!(block = ?id, error = %e, "delete failed, rolling back");
                self.view.restore(snapshot);
                Err(OpFailure::new(BlockOpKind::Delete, e))
            }
        }
    }

    /// Re-index all blocks to `0..n` in the given order.
    ///
    /// `ordered_ids` must name every block in the view exactly once.
    pub async fn reorder(&mut self, ordered_ids: &[BlockId]) -> Result<(), OpFailure> {
        self.reorder_as(BlockOpKind::Reorder, ordered_ids).await
    }

    /// Swap a block with its neighbor. Returns `false` at the edges, where
    /// nothing is dispatched.
    pub async fn move_adjacent(&mut self, id: BlockId, direction: Direction) -> Result<bool, OpFailure> {
        let sequence = order::swap_adjacent(&self.view.ordered_ids(), &id, direction)
            .map_err(|e| OpFailure::new(BlockOpKind::MoveAdjacent, e))?;
        match sequence {
            Some(sequence) => {
                self.reorder_as(BlockOpKind::MoveAdjacent, &sequence).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[tracing::instrument(skip(self, ordered_ids), fields(document = %self.document, op = %kind))]
    async fn reorder_as(&mut self, kind: BlockOpKind, ordered_ids: &[BlockId]) -> Result<(), OpFailure> {
        order::validate_reorder(&self.view.ordered_ids(), ordered_ids)
            .map_err(|e| OpFailure::new(kind, e))?;

        let snapshot = self.view.blocks();
        self.view.update(|state| {
            for (index, id) in ordered_ids.iter().enumerate() {
                if let Some(block) = state.blocks.iter_mut().find(|b| b.id == *id) {
                    block.sort_order = index as i64;
                }
            }
            order::sort_blocks(&mut state.blocks);
        });

        match self.backend.reorder(self.document, ordered_ids).await {
            Ok(()) => {
                self.emit(BlockEvent::Reordered);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "reorder failed, rolling back");
                self.view.restore(snapshot);
                Err(OpFailure::new(kind, e))
            }
        }
    }

    fn drop_block(&self, id: BlockId) {
        tracing::debug!(block = ?id, "block no longer exists, dropping from view");
        self.view.update(|state| {
            state.blocks.retain(|b| b.id != id);
            state.unsynced.remove(&id);
        });
    }
}
