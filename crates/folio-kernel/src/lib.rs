//! Async services around the folio block engine.
//!
//! `folio-blocks` owns the rules; this crate connects them to the outside:
//!
//! | Module       | Role                                                       |
//! |--------------|------------------------------------------------------------|
//! | [`backend`]  | `BlockBackend` persistence seam, memory and SQLite impls   |
//! | [`templates`]| `TemplateSource` seam for read-only templates              |
//! | [`service`]  | `BlockService`: optimistic ops with rollback per document  |
//! | [`editor`]   | `InlineEditor`: debounced per-block field saves            |
//! | [`preview`]  | Pure renderer from sorted blocks to a node tree            |
//! | [`config`]   | `FolioConfig` loaded from RON                              |
//!
//! ```text
//! picker ─► BlockService::add ─► resolve_defaults ─► BlockBackend::add
//!                 │
//!   InlineEditor ─┴► update_fields (debounced)
//!                 │
//!          BlockView ─► preview::render
//! ```

pub mod backend;
pub mod config;
pub mod editor;
pub mod preview;
pub mod service;
pub mod templates;

pub use backend::{BlockBackend, MemoryBackend, SharedBackend, SqliteBackend};
pub use config::{ConfigError, FolioConfig};
pub use editor::{InlineEditor, SyncState, DEFAULT_QUIET_PERIOD};
pub use preview::{render, render_document, Fragment, Node, Preview};
pub use service::{BlockEvent, BlockService, BlockView, ListView, OpFailure, SharedBlockService};
pub use templates::{MemoryTemplates, TemplateSource};
