//! Block document operations.
//!
//! Every mutation of a document's block list is one of four operations,
//! matching the persistence contract:
//!
//! | Op             | Wire call                          | Retry-safe |
//! |----------------|------------------------------------|------------|
//! | `Add`          | `POST /blocks/add`                 | no         |
//! | `UpdateFields` | `POST /blocks/{id}/update`         | yes        |
//! | `Delete`       | `POST /blocks/{id}/delete`         | yes        |
//! | `Reorder`      | `POST /blocks/reorder`             | yes        |
//!
//! Ops are serializable so backends can keep an append-only history.

use serde::{Deserialize, Serialize};

use folio_types::{BlockId, BlockRecord, FieldMap};

/// A single applied mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BlockOp {
    /// A block was created with this exact record (id and sort order included).
    Add { block: BlockRecord },

    /// Fields were shallow-merged into a block.
    UpdateFields { id: BlockId, fields: FieldMap },

    /// A block was removed.
    Delete { id: BlockId },

    /// Blocks were re-indexed to `0..n` in this order.
    Reorder { ordered_ids: Vec<BlockId> },
}

impl BlockOp {
    /// The block this operation targets, if it targets exactly one.
    pub fn target_block(&self) -> Option<&BlockId> {
        match self {
            BlockOp::Add { block } => Some(&block.id),
            BlockOp::UpdateFields { id, .. } => Some(id),
            BlockOp::Delete { id } => Some(id),
            BlockOp::Reorder { .. } => None,
        }
    }

    /// Check if this operation changes which blocks exist or their order.
    pub fn is_structural(&self) -> bool {
        !matches!(self, BlockOp::UpdateFields { .. })
    }

    /// Check if the collaborator may safely retry this operation.
    pub fn is_retry_safe(&self) -> bool {
        !matches!(self, BlockOp::Add { .. })
    }

    pub fn kind(&self) -> BlockOpKind {
        match self {
            BlockOp::Add { .. } => BlockOpKind::Add,
            BlockOp::UpdateFields { .. } => BlockOpKind::UpdateFields,
            BlockOp::Delete { .. } => BlockOpKind::Delete,
            BlockOp::Reorder { .. } => BlockOpKind::Reorder,
        }
    }
}

/// Names a user-facing operation, for operation-scoped failure notices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockOpKind {
    List,
    Add,
    UpdateFields,
    Delete,
    Reorder,
    MoveAdjacent,
}

impl BlockOpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockOpKind::List => "list",
            BlockOpKind::Add => "add",
            BlockOpKind::UpdateFields => "update_fields",
            BlockOpKind::Delete => "delete",
            BlockOpKind::Reorder => "reorder",
            BlockOpKind::MoveAdjacent => "move_adjacent",
        }
    }

    /// Notice shown to the user when this operation fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            BlockOpKind::List => "Failed to load blocks",
            BlockOpKind::Add => "Failed to add block",
            BlockOpKind::UpdateFields => "Failed to update block",
            BlockOpKind::Delete => "Failed to delete block",
            BlockOpKind::Reorder => "Failed to reorder blocks",
            BlockOpKind::MoveAdjacent => "Failed to move block",
        }
    }
}

impl std::fmt::Display for BlockOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> BlockRecord {
        BlockRecord {
            id: BlockId::new(),
            block_type: "hero".into(),
            sort_order: 0,
            field_data: json!({}),
        }
    }

    #[test]
    fn test_op_target_block() {
        let add = BlockOp::Add { block: record() };
        let id = add.target_block().copied().unwrap();
        assert_eq!(BlockOp::Delete { id }.target_block(), Some(&id));
        assert_eq!(BlockOp::Reorder { ordered_ids: vec![id] }.target_block(), None);
    }

    #[test]
    fn test_op_categories() {
        let update = BlockOp::UpdateFields {
            id: BlockId::new(),
            fields: FieldMap::new(),
        };
        assert!(!update.is_structural());
        assert!(update.is_retry_safe());

        let add = BlockOp::Add { block: record() };
        assert!(add.is_structural());
        assert!(!add.is_retry_safe());
    }

    #[test]
    fn test_op_serde_tagged() {
        let id = BlockId::new();
        let json = serde_json::to_value(BlockOp::Delete { id }).unwrap();
        assert_eq!(json["op"], json!("delete"));
        let parsed: BlockOp = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, BlockOp::Delete { id });
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let kinds = [
            BlockOpKind::List,
            BlockOpKind::Add,
            BlockOpKind::UpdateFields,
            BlockOpKind::Delete,
            BlockOpKind::Reorder,
            BlockOpKind::MoveAdjacent,
        ];
        let mut messages: Vec<_> = kinds.iter().map(|k| k.failure_message()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), kinds.len());
    }
}
