//! Error types for block operations.

use thiserror::Error;

use folio_types::{BlockId, FieldDataError};

/// Broad category of a [`BlockError`], used to pick a recovery strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request. Surfaced to the caller, never retried.
    Validation,
    /// Target block does not exist in this document. Caller should refresh.
    NotFound,
    /// Persistence unreachable or failed. Reads recover, writes surface.
    Transport,
}

/// Errors that can occur during block operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockError {
    /// Block not found in document.
    #[error("block not found: {0:?}")]
    BlockNotFound(BlockId),

    /// Block type name is not in the registry.
    #[error("unknown block type: {0:?}")]
    UnknownBlockType(String),

    /// Field values do not fit the block's schema.
    #[error(transparent)]
    InvalidFieldData(#[from] FieldDataError),

    /// Reorder sequence is not exactly the document's current block set.
    #[error(
        "reorder does not match current blocks (missing {missing:?}, unexpected {unexpected:?}, duplicated {duplicated:?})"
    )]
    ReorderMismatch {
        missing: Vec<BlockId>,
        unexpected: Vec<BlockId>,
        duplicated: Vec<BlockId>,
    },

    /// Block ID or sort order already taken.
    #[error("block already exists: {0:?}")]
    DuplicateBlock(BlockId),

    /// Persistence collaborator unreachable or returned a failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl BlockError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Which of the three failure classes this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockError::BlockNotFound(_) => ErrorKind::NotFound,
            BlockError::UnknownBlockType(_)
            | BlockError::InvalidFieldData(_)
            | BlockError::ReorderMismatch { .. }
            | BlockError::DuplicateBlock(_) => ErrorKind::Validation,
            BlockError::Transport(_) => ErrorKind::Transport,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert!(BlockError::BlockNotFound(BlockId::new()).is_not_found());
        assert!(BlockError::UnknownBlockType("x".into()).is_validation());
        assert!(BlockError::transport("connection refused").is_transport());
        let mismatch = BlockError::ReorderMismatch {
            missing: vec![BlockId::new()],
            unexpected: vec![],
            duplicated: vec![],
        };
        assert_eq!(mismatch.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_field_data_error_converts() {
        let err: BlockError = FieldDataError::InvalidField {
            block_type: "hero".into(),
            message: "bad".into(),
        }
        .into();
        assert!(err.is_validation());
        assert!(err.to_string().contains("hero"));
    }
}
