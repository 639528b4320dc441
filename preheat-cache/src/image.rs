use preheat_base::{AssetRef, LoadHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decoded RGBA8 thumbnail as produced by the catalog adapter
pub struct ThumbnailImage {
    pub width: u32,
    pub height: u32,
    pub pixel_data: Vec<u8>,
}

impl std::fmt::Debug for ThumbnailImage {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ThumbnailImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data_length", &self.pixel_data.len())
            .finish()
    }
}

/// How the adapter should fit the asset into the requested target size
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentMode {
    AspectFit,
    #[default]
    AspectFill,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMode {
    // May deliver one or more degraded images before the final one
    #[default]
    Opportunistic,
    // Only the final, full quality image is delivered
    HighQualityFormat,
    // A single, possibly degraded image is delivered
    FastFormat,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRequestOptions {
    pub delivery_mode: DeliveryMode,
}

/// Sent by the adapter, from any thread, each time it has a result for a load handle. A handle
/// receives any number of non-final deliveries followed by exactly one final delivery, unless it
/// is cancelled first. `image` is `None` when the load failed.
#[derive(Debug, Clone)]
pub struct ImageDelivery {
    pub handle: LoadHandle,
    pub image: Option<Arc<ThumbnailImage>>,
    pub is_final: bool,
}

/// What the rendering surface receives for a slot
#[derive(Debug, Clone)]
pub struct SlotImage {
    pub asset: AssetRef,
    pub image: Option<Arc<ThumbnailImage>>,
    pub is_final: bool,
}

impl SlotImage {
    pub fn is_absent(&self) -> bool {
        self.image.is_none()
    }
}
