//! Persistence collaborator seam.
//!
//! The block services never talk to storage directly. They go through
//! [`BlockBackend`], whose five calls mirror the host's block endpoints:
//!
//! ```text
//! list     GET  /blocks                 → ordered BlockInstance list
//! add      POST /blocks/add             → created BlockInstance
//! update   POST /blocks/{id}/update     → ack
//! delete   POST /blocks/{id}/delete     → ack
//! reorder  POST /blocks/reorder         → ack
//! ```
//!
//! Everything except `add` is safe to retry; retrying `add` creates a
//! duplicate block, so callers never retry it automatically.
//!
//! - [`MemoryBackend`]: per-document [`BlockStore`]s in a `DashMap`, with an op
//!   history and fault injection for tests
//! - [`SqliteBackend`]: one `blocks` table, reorder in a single transaction
//!
//! [`BlockStore`]: folio_blocks::BlockStore

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use folio_blocks::Result;
use folio_types::{BlockId, BlockInstance, DocumentId, FieldData, FieldMap};

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Shared handle to a persistence backend.
pub type SharedBackend = Arc<dyn BlockBackend>;

/// Block persistence for many documents.
///
/// Implementations own the authoritative block set per document and must
/// uphold the ordering rules: `add` appends at `max(sort_order) + 1`, and
/// `reorder` rejects any sequence that is not exactly the current id set.
#[async_trait]
pub trait BlockBackend: Send + Sync {
    /// Blocks of `document` in ascending `sort_order`.
    async fn list(&self, document: DocumentId) -> Result<Vec<BlockInstance>>;

    /// Create a block at the end of `document` and return it.
    async fn add(&self, document: DocumentId, fields: FieldData) -> Result<BlockInstance>;

    /// Shallow-merge `fields` into a block.
    async fn update(&self, document: DocumentId, id: BlockId, fields: &FieldMap) -> Result<()>;

    /// Remove a block.
    async fn delete(&self, document: DocumentId, id: BlockId) -> Result<()>;

    /// Re-index all blocks of `document` to `0..n` in the given order.
    async fn reorder(&self, document: DocumentId, ordered_ids: &[BlockId]) -> Result<()>;
}
