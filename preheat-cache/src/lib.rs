//! Prefetch-and-cache coordination for a scrolling grid of asset thumbnails.
//!
//! The [`CacheCoordinator`] sits between a rendering surface (which reports the visible viewport
//! and binds grid slots to catalog indices) and an [`AssetCatalogAdapter`] (which actually loads
//! and caches images). It keeps a preheat window around the viewport warm, cancels requests for
//! slots that get reused, and drops results that arrive after their request was superseded.

mod error;
pub use error::*;

mod config;
pub use config::*;

mod image;
pub use image::*;

mod adapter;
pub use adapter::*;

mod permission;
pub use permission::*;

mod viewport;
pub use viewport::*;

mod preheat_window;
pub use preheat_window::*;

mod request_ledger;
pub use request_ledger::*;

mod coordinator;
pub use coordinator::*;

pub use preheat_base::{AssetRef, IndexRange, LoadHandle, Rect, Size, SlotId};
