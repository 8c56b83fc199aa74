//! Block store: the ordered block collection of one document.
//!
//! Owns the ordering invariant: `sort_order` values are unique within the
//! store. Gaps are fine (delete never renumbers), ties never happen because
//! the only two writers of `sort_order` are [`BlockStore::insert`] (appends at
//! `max + 1`) and [`BlockStore::reorder`] (re-indexes `0..n`).

use std::collections::HashMap;

use folio_types::{BlockId, BlockInstance, DocumentId, FieldData, FieldMap};

use crate::ops::BlockOp;
use crate::order::{self, Direction};
use crate::{BlockError, Result};

/// In-memory block collection for a single document.
#[derive(Clone, Debug)]
pub struct BlockStore {
    /// Document this store belongs to.
    document_id: DocumentId,

    /// Blocks indexed by ID.
    blocks: HashMap<BlockId, BlockInstance>,

    /// Store version (bumped on any mutation).
    version: u64,
}

impl BlockStore {
    /// Create a new empty store.
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            blocks: HashMap::new(),
            version: 0,
        }
    }

    /// Rebuild a store from already-persisted blocks.
    ///
    /// Rejects duplicate IDs and duplicate sort orders.
    pub fn from_blocks(
        document_id: DocumentId,
        blocks: impl IntoIterator<Item = BlockInstance>,
    ) -> Result<Self> {
        let mut store = Self::new(document_id);
        for block in blocks {
            store.insert_instance(block)?;
        }
        store.version = 0;
        Ok(store)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Get the current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn get(&self, id: &BlockId) -> Option<&BlockInstance> {
        self.blocks.get(id)
    }

    /// Blocks in document order (ascending `sort_order`).
    pub fn list(&self) -> Vec<BlockInstance> {
        let mut blocks: Vec<_> = self.blocks.values().cloned().collect();
        order::sort_blocks(&mut blocks);
        blocks
    }

    /// Block IDs in document order.
    pub fn block_ids_ordered(&self) -> Vec<BlockId> {
        self.list().into_iter().map(|b| b.id).collect()
    }

    /// Sort order the next appended block receives.
    pub fn next_sort_order(&self) -> i64 {
        order::next_sort_order(self.blocks.values())
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Append a new block with a fresh ID at the end of the order.
    pub fn insert(&mut self, fields: FieldData) -> BlockInstance {
        let block = BlockInstance::new(BlockId::new(), self.next_sort_order(), fields);
        self.blocks.insert(block.id, block.clone());
        self.version += 1;
        tracing::debug!(document = %self.document_id, block = %block.id, block_type = block.type_name(), sort_order = block.sort_order, "inserted block");
        block
    }

    /// Insert a fully formed block (restore, replay, or remote add).
    pub fn insert_instance(&mut self, block: BlockInstance) -> Result<()> {
        if self.blocks.contains_key(&block.id) {
            return Err(BlockError::DuplicateBlock(block.id));
        }
        if self.blocks.values().any(|b| b.sort_order == block.sort_order) {
            return Err(BlockError::DuplicateBlock(block.id));
        }
        self.blocks.insert(block.id, block);
        self.version += 1;
        Ok(())
    }

    /// Shallow-merge `partial` into a block's fields.
    ///
    /// Leaves `sort_order` and the block type untouched.
    pub fn update_fields(&mut self, id: &BlockId, partial: &FieldMap) -> Result<&BlockInstance> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or(BlockError::BlockNotFound(*id))?;
        block.fields.merge(partial)?;
        self.version += 1;
        Ok(block)
    }

    /// Remove a block. Remaining sort orders are left as they are.
    pub fn delete(&mut self, id: &BlockId) -> Result<BlockInstance> {
        let block = self
            .blocks
            .remove(id)
            .ok_or(BlockError::BlockNotFound(*id))?;
        self.version += 1;
        tracing::debug!(document = %self.document_id, block = %id, "deleted block");
        Ok(block)
    }

    /// Rewrite every block's `sort_order` to its index in `ordered_ids`.
    ///
    /// `ordered_ids` must name exactly the current blocks, each once. A stale
    /// sequence (one that predates an add or delete) is rejected.
    pub fn reorder(&mut self, ordered_ids: &[BlockId]) -> Result<()> {
        let current: Vec<BlockId> = self.blocks.keys().copied().collect();
        order::validate_reorder(&current, ordered_ids)?;

        for (index, id) in ordered_ids.iter().enumerate() {
            if let Some(block) = self.blocks.get_mut(id) {
                block.sort_order = index as i64;
            }
        }
        self.version += 1;
        tracing::debug!(document = %self.document_id, count = ordered_ids.len(), "reordered blocks");
        Ok(())
    }

    /// Swap a block with its neighbor, expressed as a full reorder.
    ///
    /// Returns `false` (and changes nothing) when the block is already at
    /// that edge of the document.
    pub fn move_adjacent(&mut self, id: &BlockId, direction: Direction) -> Result<bool> {
        let sorted = self.block_ids_ordered();
        match order::swap_adjacent(&sorted, id, direction)? {
            Some(sequence) => {
                self.reorder(&sequence)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply a recorded operation.
    pub fn apply(&mut self, op: &BlockOp) -> Result<()> {
        match op {
            BlockOp::Add { block } => self.insert_instance(BlockInstance::from_record(block.clone())),
            BlockOp::UpdateFields { id, fields } => self.update_fields(id, fields).map(|_| ()),
            BlockOp::Delete { id } => self.delete(id).map(|_| ()),
            BlockOp::Reorder { ordered_ids } => self.reorder(ordered_ids),
        }
    }
}
