use crate::{
    AssetCatalogAdapter, BeginLoad, CatalogSnapshot, CompletionAllocator, CompletionDisposition,
    CoordinatorConfig, GridGeometry, ImageDelivery, PermissionGate, PreheatError,
    PreheatResult, PreheatWindowCalculator, RequestLedger, SlotGeometry, SlotImage,
    ViewportEvent, ViewportTracker,
};
use crossbeam_channel::{Receiver, Sender};
use preheat_base::{AssetRef, IndexRange, Rect, Size, SlotId};

/// Receives images for slots. Only ever called from [`CacheCoordinator::update`], so on whatever
/// thread drives the coordinator.
pub trait SlotImageSink {
    fn image_ready(
        &mut self,
        slot_id: SlotId,
        image: SlotImage,
    );
}

/// Assets the coordinator asked the adapter to start and stop caching for one window change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreheatDelta {
    pub started: Vec<AssetRef>,
    pub stopped: Vec<AssetRef>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportUpdate {
    pub visible: IndexRange,
    // None if the preheat window did not move far enough to be recomputed
    pub preheat: Option<PreheatDelta>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub requests_issued: u64,
    pub requests_cancelled: u64,
    pub duplicate_binds: u64,
    pub images_delivered: u64,
    pub absent_images_delivered: u64,
    pub stale_deliveries_dropped: u64,
    pub window_updates: u64,
    pub viewport_events_ignored: u64,
}

/// Decides what to cache, load and cancel as a grid of thumbnails scrolls.
///
/// All methods take `&mut self` and must be called from a single thread (normally the UI thread).
/// The adapter may complete loads on any thread; results queue up until [`Self::update`] hands
/// them to the [`SlotImageSink`].
pub struct CacheCoordinator<A: AssetCatalogAdapter> {
    adapter: A,
    config: CoordinatorConfig,
    tracker: ViewportTracker,
    calculator: PreheatWindowCalculator,

    // The region currently being cached. Replaced wholesale on each applied window update.
    preheat_window: Rect,

    // None until initialize() runs, which only happens once the permission gate allows it
    catalog: Option<CatalogSnapshot>,

    ledger: RequestLedger,

    delivery_tx: Sender<ImageDelivery>,
    delivery_rx: Receiver<ImageDelivery>,

    stats: CoordinatorStats,
}

impl<A: AssetCatalogAdapter> CacheCoordinator<A> {
    pub fn new(
        adapter: A,
        config: CoordinatorConfig,
    ) -> Self {
        let (delivery_tx, delivery_rx) = crossbeam_channel::unbounded();
        CacheCoordinator {
            adapter,
            tracker: ViewportTracker::new(config.layout),
            calculator: PreheatWindowCalculator::new(config.preheat),
            config,
            preheat_window: Rect::ZERO,
            catalog: None,
            ledger: RequestLedger::default(),
            delivery_tx,
            delivery_rx,
            stats: CoordinatorStats::default(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ViewportTracker {
        &self.tracker
    }

    pub fn preheat_window(&self) -> Rect {
        self.preheat_window
    }

    pub fn catalog(&self) -> Option<&CatalogSnapshot> {
        self.catalog.as_ref()
    }

    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    pub fn is_initialized(&self) -> bool {
        self.catalog.is_some()
    }

    /// Starts (or restarts) the coordinator on a catalog. Must only be called after access to the
    /// catalog was granted. Any previous state is discarded: in-flight loads are cancelled and the
    /// adapter is told to drop everything it was caching.
    pub fn initialize(
        &mut self,
        catalog: CatalogSnapshot,
    ) {
        log::info!("Initializing coordinator with {} assets", catalog.len());

        let adapter = &self.adapter;
        let mut cancelled = 0;
        self.ledger.cancel_all(|handle| {
            adapter.cancel(handle);
            cancelled += 1;
        });
        self.stats.requests_cancelled += cancelled;

        self.reset_cached_assets();
        self.catalog = Some(catalog);
    }

    /// Asks the gate for access and, if granted, captures the catalog from the adapter and
    /// initializes. If access is not granted nothing at all is done.
    pub fn initialize_with_gate(
        &mut self,
        gate: &dyn PermissionGate,
    ) -> PreheatResult<()> {
        let status = gate.authorization_status();
        if !status.grants_access() {
            log::warn!("Catalog access not granted ({:?}), not initializing", status);
            return Err(PreheatError::AccessDenied(status));
        }

        let catalog = CatalogSnapshot::capture(&self.adapter);
        self.initialize(catalog);
        Ok(())
    }

    /// Stops all caching and forgets the preheat window, so the next viewport event rebuilds it
    /// from scratch
    pub fn reset_cached_assets(&mut self) {
        self.adapter.stop_caching_all();
        self.preheat_window = Rect::ZERO;
    }

    /// Geometry for the coordinator's own grid layout at the given content size
    pub fn grid_geometry(
        &self,
        content_size: Size,
    ) -> GridGeometry {
        let item_count = self.catalog.as_ref().map(|x| x.len()).unwrap_or(0);
        self.tracker.geometry(content_size, item_count)
    }

    /// Same as [`Self::on_viewport_changed`], using the configured grid layout as the geometry
    pub fn on_grid_viewport_changed(
        &mut self,
        event: ViewportEvent,
    ) -> ViewportUpdate {
        let geometry = self.grid_geometry(event.content_size);
        self.on_viewport_changed(event, &geometry)
    }

    #[profiling::function]
    pub fn on_viewport_changed(
        &mut self,
        event: ViewportEvent,
        geometry: &dyn SlotGeometry,
    ) -> ViewportUpdate {
        // Update only if the surface is on screen and we have something to show
        let catalog = match &self.catalog {
            Some(catalog) if event.is_visible => catalog,
            _ => {
                self.stats.viewport_events_ignored += 1;
                return ViewportUpdate::default();
            }
        };

        let visible = IndexRange::from_indices(&geometry.indices_in_rect(event.visible_rect))
            .clamp_to(catalog.len());

        let update = self
            .calculator
            .update_window(self.preheat_window, event.visible_rect);
        if !update.applied {
            return ViewportUpdate {
                visible,
                preheat: None,
            };
        }

        let (added_indices, removed_indices) = update.resolve_indices(geometry);
        let started = catalog.assets_at(&added_indices);
        let stopped = catalog.assets_at(&removed_indices);

        log::debug!(
            "preheat window {:?} -> {:?}, start caching {} assets, stop caching {}",
            self.preheat_window,
            update.new_window,
            started.len(),
            stopped.len()
        );

        if !started.is_empty() {
            self.adapter.start_caching(
                &started,
                self.config.thumbnail_size,
                self.config.content_mode,
                &self.config.request_options,
            );
        }

        if !stopped.is_empty() {
            self.adapter.stop_caching(
                &stopped,
                self.config.thumbnail_size,
                self.config.content_mode,
                &self.config.request_options,
            );
        }

        // Store the computed rectangle for future comparison
        self.preheat_window = update.new_window;
        self.stats.window_updates += 1;

        ViewportUpdate {
            visible,
            preheat: Some(PreheatDelta { started, stopped }),
        }
    }

    /// The surface bound `slot_id` to the asset at `index` in the catalog. Returns None if the
    /// index doesn't refer to an asset, in which case any load still running for the slot is
    /// cancelled.
    pub fn on_slot_bound(
        &mut self,
        slot_id: SlotId,
        index: usize,
    ) -> Option<BeginLoad> {
        let asset = match self.catalog.as_ref().and_then(|x| x.asset_at(index)) {
            Some(asset) => asset,
            None => {
                log::warn!(
                    "slot {:?} bound to index {} which is not in the catalog",
                    slot_id,
                    index
                );
                // The slot no longer shows what it was loading before
                self.on_slot_unbound(slot_id);
                return None;
            }
        };

        Some(self.on_slot_bound_asset(slot_id, asset))
    }

    /// Like [`Self::on_slot_bound`] for surfaces that identify items by asset rather than index
    pub fn on_slot_bound_asset(
        &mut self,
        slot_id: SlotId,
        asset: AssetRef,
    ) -> BeginLoad {
        let adapter = &self.adapter;
        let config = &self.config;
        let delivery_tx = &self.delivery_tx;
        let mut cancelled = false;

        let result = self.ledger.begin_load(
            slot_id,
            asset,
            |handle| {
                adapter.cancel(handle);
                cancelled = true;
            },
            || {
                adapter.request_image(
                    asset,
                    config.thumbnail_size,
                    config.content_mode,
                    &config.request_options,
                    CompletionAllocator::new(delivery_tx),
                )
            },
        );

        if cancelled {
            self.stats.requests_cancelled += 1;
        }

        match result {
            BeginLoad::Issued(handle) => {
                log::trace!("slot {:?} requested {:?} as {:?}", slot_id, asset, handle);
                self.stats.requests_issued += 1;
            }
            BeginLoad::AlreadyInFlight(_) => {
                self.stats.duplicate_binds += 1;
            }
        }

        result
    }

    /// The surface stopped displaying the slot. Cancels its load if it's still running.
    pub fn on_slot_unbound(
        &mut self,
        slot_id: SlotId,
    ) -> bool {
        let adapter = &self.adapter;
        let cancelled = self
            .ledger
            .complete_or_cancel(slot_id, |handle| adapter.cancel(handle));
        if cancelled {
            self.stats.requests_cancelled += 1;
        }
        cancelled
    }

    /// Hands every delivery that arrived since the last call to the sink, on the calling thread.
    /// Deliveries for cancelled or superseded handles are dropped. Failed loads reach the sink as
    /// an absent image and are not retried. Returns the number of images delivered.
    #[profiling::function]
    pub fn update(
        &mut self,
        sink: &mut dyn SlotImageSink,
    ) -> usize {
        let mut delivered = 0;
        while let Ok(delivery) = self.delivery_rx.try_recv() {
            match self.ledger.complete(delivery.handle, delivery.is_final) {
                CompletionDisposition::Current { slot_id, asset } => {
                    if delivery.image.is_none() {
                        log::debug!("{}, showing no image", PreheatError::LoadFailed(asset));
                        self.stats.absent_images_delivered += 1;
                    }

                    self.stats.images_delivered += 1;
                    delivered += 1;
                    sink.image_ready(
                        slot_id,
                        SlotImage {
                            asset,
                            image: delivery.image,
                            is_final: delivery.is_final,
                        },
                    );
                }
                CompletionDisposition::Stale => {
                    log::trace!("{}", PreheatError::StaleCompletion(delivery.handle));
                    self.stats.stale_deliveries_dropped += 1;
                }
            }
        }

        delivered
    }
}
