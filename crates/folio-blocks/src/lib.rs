//! Ordered, typed content-block engine for folio.
//!
//! A newsletter (or any block-composed page) is an ordered set of
//! independently editable blocks. This crate holds the synchronous core:
//!
//! - [`registry`]: the static block type catalog and per-type defaults
//! - [`resolve_defaults`]: template defaults layered over registry defaults
//! - [`BlockStore`]: one document's blocks, owning the ordering invariant
//! - [`order`]: reorder validation and adjacent-move composition
//! - [`BlockOp`]: the four mutations, as serializable records
//!
//! # Ordering
//!
//! `sort_order` is unique per document. Add appends at `max + 1`, delete
//! leaves gaps, reorder re-indexes to `0..n` from a complete id sequence.
//! Listing always sorts ascending, so gaps never affect the visible order.
//!
//! # Defaults
//!
//! New blocks start from registry defaults; if the document has a template,
//! the first zone (in definition order) that enables the block type lays its
//! defaults over them, shallowly.

mod block_store;
mod error;
pub mod ops;
pub mod order;
pub mod registry;
mod resolve;

pub use block_store::BlockStore;
pub use error::{BlockError, ErrorKind};
pub use ops::{BlockOp, BlockOpKind};
pub use order::Direction;
pub use registry::{Category, RegistryEntry};
pub use resolve::resolve_defaults;

/// Result type for block operations.
pub type Result<T> = std::result::Result<T, BlockError>;

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{BlockType, DocumentId};
    use serde_json::json;

    #[test]
    fn test_newsletter_scenario() {
        let mut store = BlockStore::new(DocumentId::new());

        let intro_defaults = resolve_defaults(BlockType::Introduction, None);
        assert_eq!(
            intro_defaults.to_json(),
            json!({"title": "", "subtitle": "", "body": ""})
        );

        let hero = store.insert(resolve_defaults(BlockType::Hero, None));
        let intro = store.insert(intro_defaults);
        let footer = store.insert(resolve_defaults(BlockType::Footer, None));

        let list = store.list();
        assert_eq!(list.iter().map(|b| b.id).collect::<Vec<_>>(), [hero.id, intro.id, footer.id]);
        assert_eq!(list.iter().map(|b| b.sort_order).collect::<Vec<_>>(), [0, 1, 2]);

        store.reorder(&[footer.id, hero.id, intro.id]).unwrap();
        let list = store.list();
        assert_eq!(
            list.iter().map(|b| b.block_type()).collect::<Vec<_>>(),
            [Some(BlockType::Footer), Some(BlockType::Hero), Some(BlockType::Introduction)]
        );
        assert_eq!(list.iter().map(|b| b.sort_order).collect::<Vec<_>>(), [0, 1, 2]);

        store.delete(&hero.id).unwrap();
        let list = store.list();
        assert_eq!(list.iter().map(|b| b.id).collect::<Vec<_>>(), [footer.id, intro.id]);
    }
}
