//! Penpot design-file core.
//!
//! Turns declarative edits ("add a rectangle here", "make this red") into a
//! Penpot change list and submits it under optimistic concurrency.
//!
//! # Layers
//!
//! ```text
//!   Editor::apply(file_id, intents)
//!        │
//!        ├── changes   intents ──▶ Change list      (validated up front)
//!        ├── session   begin ──▶ submit             (one revision, no retry)
//!        └── codec     model ◀──▶ wire              (Transit write / JSON read)
//!                          │
//!                     Platform trait
//!                  ┌───────┴────────┐
//!            HttpPlatform     InMemoryPlatform
//! ```
//!
//! # Modules
//!
//! - [`model`] — Domain types: objects, pages, files, changes
//! - [`codec`] — Casing and tagging rules for both wire dialects
//! - [`changes`] — Change-list builder and paint helpers
//! - [`session`] — Optimistic update session
//! - [`editor`] — `apply` entry point
//! - [`platform`] — Backend seam and the re-authentication hook
//! - [`client`] — HTTP backend
//! - [`memory`] — In-memory backend
//! - [`cache`] — File cache
//! - [`error`] — Error types

pub mod cache;
pub mod changes;
pub mod client;
pub mod codec;
pub mod editor;
pub mod error;
pub mod memory;
pub mod model;
pub mod platform;
pub mod session;

pub use cache::FileCache;
pub use changes::{ChangeListBuilder, Intent};
pub use client::{Credentials, ExportFormat, HttpPlatform};
pub use editor::{ApplyOutcome, Editor};
pub use error::{PenpotError, PenpotResult, StaleReadWarning};
pub use memory::InMemoryPlatform;
pub use model::{Change, DesignObject, File, Id, ObjectKind, Page};
pub use platform::Platform;
pub use session::{SessionState, UpdateSession};
