pub mod hashing;
pub mod lru_cache;

mod asset_ref;
pub use asset_ref::AssetRef;

mod handle;
pub use handle::LoadHandle;
pub use handle::SlotId;

mod geometry;
pub use geometry::IndexRange;
pub use geometry::Rect;
pub use geometry::Size;
