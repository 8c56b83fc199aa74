//! Shared identity, block, and template types for folio.
//!
//! This crate is the data model foundation: typed IDs, the closed set of
//! block types, the per-type field records, and templates. It has **no
//! internal folio dependencies**, a pure leaf crate that the block engine,
//! the services, and the CLI build on.
//!
//! # Entity Overview
//!
//! ```text
//! Newsletter (DocumentId)
//!     └── optional template_id → Template (TemplateId)
//!     │       └── zones (ordered) → block type → { enabled, defaults }
//!     └── owns BlockInstance* (BlockId)
//!             └── sort_order (unique within the document)
//!             └── fields: FieldData (one typed record per BlockType)
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`BlockType`]     | Closed set of block kinds                    |
//! | [`FieldData`]     | Tagged union of per-type field records       |
//! | [`BlockInstance`] | One positioned block in a document           |
//! | [`BlockRecord`]   | Persistence wire shape of a block            |
//! | [`Template`]      | Zone configuration seeding new blocks        |
//! | [`Newsletter`]    | Parent document metadata                     |
//! |-------------------|----------------------------------------------|

pub mod block;
pub mod document;
pub mod ids;
pub mod template;

pub use block::{
    ArticleLink, ArticleListFields, BlockInstance, BlockRecord, BlockType, CallToActionFields,
    DividerFields, FieldData, FieldDataError, FieldMap, FooterFields, HeroFields,
    IntroductionFields, MarketIndex, MarketOverviewFields, NewsItem, NewsRoundupFields,
    SocialLink, StockPick, StockSpotlightFields,
};
pub use document::Newsletter;
pub use ids::{BlockId, DocumentId, PrefixError, TemplateId, resolve_block_prefix};
pub use template::{Template, TemplateZone, ZoneBlockConfig};

/// Current time as Unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
