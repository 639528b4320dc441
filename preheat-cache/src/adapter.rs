use crate::{ContentMode, ImageDelivery, ImageRequestOptions, ThumbnailImage};
use crossbeam_channel::Sender;
use preheat_base::{AssetRef, LoadHandle, Size};
use std::sync::Arc;

//
// Interface to the photo library (or any other source of thumbnails)
//
// The adapter owns the actual image loading and its cache of decoded images. The coordinator only
// tells it what to load, what to keep warm and what it no longer needs. Loads complete
// asynchronously, possibly on the adapter's own worker threads; results are pushed into the
// CompletionSender given with the request and picked up later by CacheCoordinator::update on the
// thread that owns the coordinator.
//

/// Cloneable handle the adapter uses to deliver results for one request. Safe to move to any
/// thread. Sending after the coordinator has been dropped is a no-op.
#[derive(Clone)]
pub struct CompletionSender {
    handle: LoadHandle,
    delivery_tx: Sender<ImageDelivery>,
}

impl CompletionSender {
    pub fn new(
        handle: LoadHandle,
        delivery_tx: Sender<ImageDelivery>,
    ) -> Self {
        CompletionSender {
            handle,
            delivery_tx,
        }
    }

    pub fn handle(&self) -> LoadHandle {
        self.handle
    }

    /// A degraded image, more deliveries will follow
    pub fn send_degraded(
        &self,
        image: Arc<ThumbnailImage>,
    ) {
        self.send(Some(image), false);
    }

    /// The last delivery for this handle. `None` means the load failed.
    pub fn send_final(
        &self,
        image: Option<Arc<ThumbnailImage>>,
    ) {
        self.send(image, true);
    }

    fn send(
        &self,
        image: Option<Arc<ThumbnailImage>>,
        is_final: bool,
    ) {
        let _ = self.delivery_tx.send(ImageDelivery {
            handle: self.handle,
            image,
            is_final,
        });
    }
}

/// Hands out handles and the matching [`CompletionSender`]. Adapters call `allocate` inside
/// `request_image`.
pub struct CompletionAllocator<'a> {
    delivery_tx: &'a Sender<ImageDelivery>,
}

impl<'a> CompletionAllocator<'a> {
    pub fn new(delivery_tx: &'a Sender<ImageDelivery>) -> Self {
        CompletionAllocator { delivery_tx }
    }

    pub fn allocate(
        &self,
        handle: LoadHandle,
    ) -> CompletionSender {
        CompletionSender::new(handle, self.delivery_tx.clone())
    }
}

pub trait AssetCatalogAdapter: Send + Sync {
    // Number of assets in the catalog
    fn count(&self) -> usize;

    // The asset at a position in the catalog ordering
    fn asset_at(
        &self,
        index: usize,
    ) -> Option<AssetRef>;

    // Start loading a thumbnail. The returned handle identifies the request for cancel() and is
    // what every delivery sent through the allocated CompletionSender carries. Handles must be
    // unique for the adapter's lifetime.
    fn request_image(
        &self,
        asset: AssetRef,
        target_size: Size,
        content_mode: ContentMode,
        options: &ImageRequestOptions,
        completion: CompletionAllocator,
    ) -> LoadHandle;

    // Best effort, a late delivery for the handle may still arrive
    fn cancel(
        &self,
        handle: LoadHandle,
    );

    fn start_caching(
        &self,
        assets: &[AssetRef],
        target_size: Size,
        content_mode: ContentMode,
        options: &ImageRequestOptions,
    );

    fn stop_caching(
        &self,
        assets: &[AssetRef],
        target_size: Size,
        content_mode: ContentMode,
        options: &ImageRequestOptions,
    );

    fn stop_caching_all(&self);
}

/// Ordered asset list the coordinator works from. Replaced wholesale when the catalog changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    assets: Vec<AssetRef>,
}

impl CatalogSnapshot {
    pub fn new(assets: Vec<AssetRef>) -> Self {
        CatalogSnapshot { assets }
    }

    pub fn capture(adapter: &dyn AssetCatalogAdapter) -> Self {
        profiling::scope!("CatalogSnapshot::capture");
        let count = adapter.count();
        let mut assets = Vec::with_capacity(count);
        for index in 0..count {
            match adapter.asset_at(index) {
                Some(asset) => assets.push(asset),
                None => {
                    log::warn!(
                        "catalog reported {} assets but has none at index {}, truncating",
                        count,
                        index
                    );
                    break;
                }
            }
        }

        CatalogSnapshot { assets }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn asset_at(
        &self,
        index: usize,
    ) -> Option<AssetRef> {
        self.assets.get(index).copied()
    }

    /// Assets for the given indices, skipping any past the end
    pub fn assets_at(
        &self,
        indices: &[usize],
    ) -> Vec<AssetRef> {
        indices
            .iter()
            .filter_map(|&index| self.asset_at(index))
            .collect()
    }
}
