use crossbeam_channel::{Receiver, Sender};
use preheat_base::hashing::{HashMap, HashSet};
use preheat_base::lru_cache::LruCache;
use preheat_base::{AssetRef, LoadHandle, Size};
use preheat_cache::{
    AssetCatalogAdapter, AuthorizationStatus, CompletionAllocator, CompletionSender, ContentMode,
    DeliveryMode, ImageRequestOptions, PermissionGate, PreheatError, PreheatResult, ThumbnailImage,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimulatedLibraryConfig {
    pub asset_count: usize,
    pub worker_count: usize,
    // How long "decoding" one thumbnail takes
    pub decode_latency: Duration,
    // Every n-th asset has no decodable image. None if every asset loads.
    pub failure_interval: Option<usize>,
    // Number of decoded thumbnails the library keeps warm
    pub cache_capacity: u32,
    pub authorization: AuthorizationStatus,
}

impl Default for SimulatedLibraryConfig {
    fn default() -> Self {
        SimulatedLibraryConfig {
            asset_count: 2000,
            worker_count: 4,
            decode_latency: Duration::from_millis(8),
            failure_interval: Some(97),
            cache_capacity: 512,
            authorization: AuthorizationStatus::Authorized,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SimulatedAsset {
    asset: AssetRef,
    pixel_width: u32,
    pixel_height: u32,
    decodable: bool,
}

impl SimulatedAsset {
    // Synthesizes the thumbnail. Every asset gets its own flat color.
    fn decode(
        &self,
        target_size: Size,
        content_mode: ContentMode,
    ) -> Option<ThumbnailImage> {
        if !self.decodable {
            return None;
        }

        let (width, height) = fit_size(
            self.pixel_width,
            self.pixel_height,
            target_size,
            content_mode,
        );
        let color = (self.asset.0 as u32 | 0xFF00_0000).to_le_bytes();
        let pixel_count = width as usize * height as usize;
        let mut pixel_data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            pixel_data.extend_from_slice(&color);
        }

        Some(ThumbnailImage {
            width,
            height,
            pixel_data,
        })
    }
}

// Aspect fill covers the target exactly (cropping the long side), aspect fit scales the asset to fit
// inside the target
fn fit_size(
    pixel_width: u32,
    pixel_height: u32,
    target_size: Size,
    content_mode: ContentMode,
) -> (u32, u32) {
    let target_width = target_size.width.round().max(1.0);
    let target_height = target_size.height.round().max(1.0);
    match content_mode {
        ContentMode::AspectFill => (target_width as u32, target_height as u32),
        ContentMode::AspectFit => {
            let scale = (target_width / pixel_width as f32).min(target_height / pixel_height as f32);
            let width = (pixel_width as f32 * scale).round().max(1.0);
            let height = (pixel_height as f32 * scale).round().max(1.0);
            (width as u32, height as u32)
        }
    }
}

fn degraded_image() -> Arc<ThumbnailImage> {
    Arc::new(ThumbnailImage {
        width: 1,
        height: 1,
        pixel_data: vec![128, 128, 128, 255],
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    asset: AssetRef,
    width: u32,
    height: u32,
    content_mode: ContentMode,
}

impl CacheKey {
    fn new(
        asset: AssetRef,
        target_size: Size,
        content_mode: ContentMode,
    ) -> Self {
        CacheKey {
            asset,
            width: target_size.width.round() as u32,
            height: target_size.height.round() as u32,
            content_mode,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryStats {
    pub decoded: usize,
    pub served_from_cache: usize,
    pub cancelled_before_decode: usize,
    pub cancelled_after_decode: usize,
    pub failed: usize,
    pub preheated: usize,
}

// State shared between the library and its worker threads
struct LibraryShared {
    assets: Vec<SimulatedAsset>,
    asset_lookup: HashMap<AssetRef, usize>,
    decode_latency: Duration,

    // Decoded thumbnails for assets the coordinator asked to keep warm
    thumbnail_cache: Mutex<LruCache<CacheKey, Arc<ThumbnailImage>>>,
    // Assets currently between start_caching and stop_caching
    caching: Mutex<HashSet<CacheKey>>,
    // Loads that haven't finished yet. The value is true once the load was cancelled.
    pending_loads: Mutex<HashMap<LoadHandle, bool>>,

    stats: Mutex<LibraryStats>,
}

impl LibraryShared {
    fn asset(
        &self,
        asset: AssetRef,
    ) -> Option<&SimulatedAsset> {
        self.asset_lookup.get(&asset).map(|&index| &self.assets[index])
    }

    fn is_cancelled(
        &self,
        handle: LoadHandle,
    ) -> bool {
        self.pending_loads
            .lock()
            .map(|x| x.get(&handle).copied().unwrap_or(true))
            .unwrap_or(true)
    }

    fn finish_load(
        &self,
        handle: LoadHandle,
    ) {
        if let Ok(mut pending_loads) = self.pending_loads.lock() {
            pending_loads.remove(&handle);
        }
    }

    fn cached_thumbnail(
        &self,
        key: &CacheKey,
    ) -> Option<Arc<ThumbnailImage>> {
        self.thumbnail_cache
            .lock()
            .ok()
            .and_then(|mut x| x.get(key).cloned())
    }

    fn is_caching(
        &self,
        key: &CacheKey,
    ) -> bool {
        self.caching
            .lock()
            .map(|x| x.contains(key))
            .unwrap_or(false)
    }

    fn update_stats<F: FnOnce(&mut LibraryStats)>(
        &self,
        f: F,
    ) {
        if let Ok(mut stats) = self.stats.lock() {
            (f)(&mut *stats);
        }
    }
}

struct LoadRequest {
    handle: LoadHandle,
    asset: AssetRef,
    target_size: Size,
    content_mode: ContentMode,
    delivery_mode: DeliveryMode,
    completion: CompletionSender,
}

struct PreheatRequest {
    key: CacheKey,
    target_size: Size,
}

enum LibraryRequest {
    Load(LoadRequest),
    Preheat(PreheatRequest),
}

fn process_load(
    shared: &LibraryShared,
    request: LoadRequest,
) {
    profiling::scope!("process_load");
    if shared.is_cancelled(request.handle) {
        log::trace!("{:?} cancelled before decode", request.handle);
        shared.update_stats(|x| x.cancelled_before_decode += 1);
        shared.finish_load(request.handle);
        return;
    }

    let key = CacheKey::new(request.asset, request.target_size, request.content_mode);
    if let Some(image) = shared.cached_thumbnail(&key) {
        shared.update_stats(|x| x.served_from_cache += 1);
        shared.finish_load(request.handle);
        request.completion.send_final(Some(image));
        return;
    }

    if request.delivery_mode == DeliveryMode::Opportunistic {
        request.completion.send_degraded(degraded_image());
    }

    std::thread::sleep(shared.decode_latency);

    let image = shared
        .asset(request.asset)
        .and_then(|x| x.decode(request.target_size, request.content_mode))
        .map(Arc::new);

    if shared.is_cancelled(request.handle) {
        log::trace!("{:?} cancelled after decode", request.handle);
        shared.update_stats(|x| x.cancelled_after_decode += 1);
        shared.finish_load(request.handle);
        return;
    }

    match &image {
        Some(image) => {
            shared.update_stats(|x| x.decoded += 1);
            if shared.is_caching(&key) {
                if let Ok(mut thumbnail_cache) = shared.thumbnail_cache.lock() {
                    thumbnail_cache.insert(key, image.clone());
                }
            }
        }
        None => {
            log::debug!("no image for {:?}", request.asset);
            shared.update_stats(|x| x.failed += 1);
        }
    }

    shared.finish_load(request.handle);
    request.completion.send_final(image);
}

fn process_preheat(
    shared: &LibraryShared,
    request: PreheatRequest,
) {
    profiling::scope!("process_preheat");

    // Skip if caching was stopped while the request was queued, or it's already warm
    if !shared.is_caching(&request.key) || shared.cached_thumbnail(&request.key).is_some() {
        return;
    }

    std::thread::sleep(shared.decode_latency);

    let image = shared
        .asset(request.key.asset)
        .and_then(|x| x.decode(request.target_size, request.key.content_mode));

    if let Some(image) = image {
        if shared.is_caching(&request.key) {
            if let Ok(mut thumbnail_cache) = shared.thumbnail_cache.lock() {
                thumbnail_cache.insert(request.key, Arc::new(image));
            }
            shared.update_stats(|x| x.preheated += 1);
        }
    }
}

// Thread that tries to take jobs out of the request channel and ends when the finish channel is signalled
struct LibraryWorkerThread {
    finish_tx: Sender<()>,
    join_handle: JoinHandle<()>,
}

impl LibraryWorkerThread {
    fn new(
        shared: Arc<LibraryShared>,
        request_rx: Receiver<LibraryRequest>,
        active_request_count: Arc<AtomicUsize>,
        thread_index: usize,
    ) -> PreheatResult<Self> {
        let (finish_tx, finish_rx) = crossbeam_channel::bounded(1);
        let join_handle = std::thread::Builder::new()
            .name(format!("Library Thread {}", thread_index))
            .spawn(move || {
                profiling::register_thread!(&format!("LibraryWorkerThread {}", thread_index));
                loop {
                    crossbeam_channel::select! {
                        recv(request_rx) -> msg => {
                            match msg {
                                Ok(LibraryRequest::Load(request)) => process_load(&shared, request),
                                Ok(LibraryRequest::Preheat(request)) => process_preheat(&shared, request),
                                // All senders are gone, nothing more will arrive
                                Err(_) => return,
                            }
                            active_request_count.fetch_sub(1, Ordering::Release);
                        },
                        recv(finish_rx) -> _msg => {
                            return;
                        }
                    }
                }
            })?;

        Ok(LibraryWorkerThread {
            finish_tx,
            join_handle,
        })
    }
}

// Spans N threads, proxies requests to them, and kills the threads when the pool is finished
struct LibraryThreadPool {
    worker_threads: Vec<LibraryWorkerThread>,
    request_tx: Sender<LibraryRequest>,
    active_request_count: Arc<AtomicUsize>,
}

impl LibraryThreadPool {
    fn new(
        shared: Arc<LibraryShared>,
        worker_count: usize,
    ) -> PreheatResult<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<LibraryRequest>();
        let active_request_count = Arc::new(AtomicUsize::new(0));

        let mut worker_threads = Vec::with_capacity(worker_count);
        for thread_index in 0..worker_count.max(1) {
            let worker = LibraryWorkerThread::new(
                shared.clone(),
                request_rx.clone(),
                active_request_count.clone(),
                thread_index,
            )?;
            worker_threads.push(worker);
        }

        Ok(LibraryThreadPool {
            worker_threads,
            request_tx,
            active_request_count,
        })
    }

    fn add_request(
        &self,
        request: LibraryRequest,
    ) {
        self.active_request_count.fetch_add(1, Ordering::Release);
        if self.request_tx.send(request).is_err() {
            self.active_request_count.fetch_sub(1, Ordering::Release);
        }
    }

    fn active_request_count(&self) -> usize {
        self.active_request_count.load(Ordering::Acquire)
    }

    fn finish(self) {
        for worker_thread in &self.worker_threads {
            let _ = worker_thread.finish_tx.send(());
        }

        for worker_thread in self.worker_threads {
            if worker_thread.join_handle.join().is_err() {
                log::error!("library worker thread panicked");
            }
        }
    }
}

/// An in-memory photo library. Thumbnails are synthesized on a pool of worker threads after a fixed
/// latency, and the ones the coordinator asks to keep warm are held in an LRU cache.
pub struct SimulatedPhotoLibrary {
    shared: Arc<LibraryShared>,
    thread_pool: Option<LibraryThreadPool>,
    next_handle: AtomicU64,
    authorization: AuthorizationStatus,
}

impl Drop for SimulatedPhotoLibrary {
    fn drop(&mut self) {
        if let Some(thread_pool) = self.thread_pool.take() {
            thread_pool.finish();
        }
    }
}

impl SimulatedPhotoLibrary {
    pub fn new(config: &SimulatedLibraryConfig) -> PreheatResult<Self> {
        if config.cache_capacity == 0 {
            return Err(PreheatError::StringError(
                "thumbnail cache capacity must be greater than 0".to_string(),
            ));
        }

        let mut assets = Vec::with_capacity(config.asset_count);
        let mut asset_lookup = HashMap::default();
        for index in 0..config.asset_count {
            let asset = AssetRef::from_uuid(uuid::Uuid::new_v4());
            // Mix of landscape, portrait and square photos
            let (pixel_width, pixel_height) = match index % 3 {
                0 => (4032, 3024),
                1 => (3024, 4032),
                _ => (3024, 3024),
            };
            let decodable = config
                .failure_interval
                .map(|interval| interval == 0 || (index + 1) % interval != 0)
                .unwrap_or(true);

            asset_lookup.insert(asset, index);
            assets.push(SimulatedAsset {
                asset,
                pixel_width,
                pixel_height,
                decodable,
            });
        }

        let shared = Arc::new(LibraryShared {
            assets,
            asset_lookup,
            decode_latency: config.decode_latency,
            thumbnail_cache: Mutex::new(LruCache::new(config.cache_capacity)),
            caching: Default::default(),
            pending_loads: Default::default(),
            stats: Default::default(),
        });

        let thread_pool = LibraryThreadPool::new(shared.clone(), config.worker_count)?;
        log::info!(
            "Simulated library with {} assets on {} worker threads",
            config.asset_count,
            config.worker_count.max(1)
        );

        Ok(SimulatedPhotoLibrary {
            shared,
            thread_pool: Some(thread_pool),
            next_handle: AtomicU64::new(1),
            authorization: config.authorization,
        })
    }

    pub fn stats(&self) -> LibraryStats {
        self.shared
            .stats
            .lock()
            .map(|x| *x)
            .unwrap_or_default()
    }

    pub fn cached_thumbnail_count(&self) -> usize {
        self.shared
            .thumbnail_cache
            .lock()
            .map(|x| x.len())
            .unwrap_or(0)
    }

    /// Number of loads and preheats queued or running on the worker threads
    pub fn active_request_count(&self) -> usize {
        self.thread_pool
            .as_ref()
            .map(|x| x.active_request_count())
            .unwrap_or(0)
    }

    fn add_request(
        &self,
        request: LibraryRequest,
    ) {
        if let Some(thread_pool) = &self.thread_pool {
            thread_pool.add_request(request);
        }
    }
}

impl PermissionGate for SimulatedPhotoLibrary {
    fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization
    }
}

impl AssetCatalogAdapter for SimulatedPhotoLibrary {
    fn count(&self) -> usize {
        self.shared.assets.len()
    }

    fn asset_at(
        &self,
        index: usize,
    ) -> Option<AssetRef> {
        self.shared.assets.get(index).map(|x| x.asset)
    }

    fn request_image(
        &self,
        asset: AssetRef,
        target_size: Size,
        content_mode: ContentMode,
        options: &ImageRequestOptions,
        completion: CompletionAllocator,
    ) -> LoadHandle {
        let handle = LoadHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut pending_loads) = self.shared.pending_loads.lock() {
            pending_loads.insert(handle, false);
        }

        self.add_request(LibraryRequest::Load(LoadRequest {
            handle,
            asset,
            target_size,
            content_mode,
            delivery_mode: options.delivery_mode,
            completion: completion.allocate(handle),
        }));

        handle
    }

    fn cancel(
        &self,
        handle: LoadHandle,
    ) {
        if let Ok(mut pending_loads) = self.shared.pending_loads.lock() {
            if let Some(cancelled) = pending_loads.get_mut(&handle) {
                *cancelled = true;
            }
        }
    }

    fn start_caching(
        &self,
        assets: &[AssetRef],
        target_size: Size,
        content_mode: ContentMode,
        _options: &ImageRequestOptions,
    ) {
        profiling::scope!("SimulatedPhotoLibrary::start_caching");
        let mut keys = Vec::with_capacity(assets.len());
        if let Ok(mut caching) = self.shared.caching.lock() {
            for &asset in assets {
                let key = CacheKey::new(asset, target_size, content_mode);
                if caching.insert(key) {
                    keys.push(key);
                }
            }
        }

        for key in keys {
            self.add_request(LibraryRequest::Preheat(PreheatRequest { key, target_size }));
        }
    }

    fn stop_caching(
        &self,
        assets: &[AssetRef],
        target_size: Size,
        content_mode: ContentMode,
        _options: &ImageRequestOptions,
    ) {
        profiling::scope!("SimulatedPhotoLibrary::stop_caching");
        let keys: Vec<_> = assets
            .iter()
            .map(|&asset| CacheKey::new(asset, target_size, content_mode))
            .collect();

        if let Ok(mut caching) = self.shared.caching.lock() {
            for key in &keys {
                caching.remove(key);
            }
        }

        if let Ok(mut thumbnail_cache) = self.shared.thumbnail_cache.lock() {
            for key in &keys {
                thumbnail_cache.remove(key);
            }
        }
    }

    fn stop_caching_all(&self) {
        if let Ok(mut caching) = self.shared.caching.lock() {
            caching.clear();
        }

        if let Ok(mut thumbnail_cache) = self.shared.thumbnail_cache.lock() {
            thumbnail_cache.clear();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use preheat_cache::ImageDelivery;

    fn test_config() -> SimulatedLibraryConfig {
        SimulatedLibraryConfig {
            asset_count: 20,
            worker_count: 2,
            decode_latency: Duration::from_millis(1),
            failure_interval: Some(5),
            cache_capacity: 8,
            authorization: AuthorizationStatus::Limited,
        }
    }

    fn options(delivery_mode: DeliveryMode) -> ImageRequestOptions {
        ImageRequestOptions { delivery_mode }
    }

    fn receive_final(rx: &Receiver<ImageDelivery>) -> ImageDelivery {
        loop {
            let delivery = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if delivery.is_final {
                return delivery;
            }
        }
    }

    #[test]
    fn aspect_fit_and_fill_sizes() {
        let target = Size::new(40.0, 40.0);
        assert_eq!(fit_size(4032, 3024, target, ContentMode::AspectFill), (40, 40));
        assert_eq!(fit_size(4032, 3024, target, ContentMode::AspectFit), (40, 30));
        assert_eq!(fit_size(3024, 4032, target, ContentMode::AspectFit), (30, 40));
    }

    #[test]
    fn aspect_fit_decode_fills_the_fitted_size() {
        let asset = SimulatedAsset {
            asset: AssetRef(7),
            pixel_width: 4032,
            pixel_height: 3024,
            decodable: true,
        };
        let image = asset
            .decode(Size::new(400.0, 400.0), ContentMode::AspectFit)
            .unwrap();
        assert_eq!((image.width, image.height), (400, 300));
        assert_eq!(image.pixel_data.len(), 400 * 300 * 4);
        assert_eq!(&image.pixel_data[0..4], &[7, 0, 0, 255]);
    }

    #[test]
    fn opportunistic_load_sends_degraded_then_final() {
        let library = SimulatedPhotoLibrary::new(&test_config()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let asset = library.asset_at(0).unwrap();
        let handle = library.request_image(
            asset,
            Size::new(30.0, 30.0),
            ContentMode::AspectFill,
            &options(DeliveryMode::Opportunistic),
            CompletionAllocator::new(&tx),
        );

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.handle, handle);
        assert!(!first.is_final);
        assert_eq!(first.image.unwrap().width, 1);

        let last = receive_final(&rx);
        assert_eq!(last.handle, handle);
        let image = last.image.unwrap();
        assert_eq!((image.width, image.height), (30, 30));
        assert_eq!(image.pixel_data.len(), 30 * 30 * 4);
    }

    #[test]
    fn every_nth_asset_fails() {
        let library = SimulatedPhotoLibrary::new(&test_config()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        // The fifth asset fails with an interval of 5
        library.request_image(
            library.asset_at(4).unwrap(),
            Size::new(30.0, 30.0),
            ContentMode::AspectFill,
            &options(DeliveryMode::HighQualityFormat),
            CompletionAllocator::new(&tx),
        );

        let delivery = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(delivery.is_final);
        assert!(delivery.image.is_none());
        assert_eq!(library.stats().failed, 1);
    }

    #[test]
    fn cached_assets_are_served_from_cache() {
        let library = SimulatedPhotoLibrary::new(&test_config()).unwrap();
        let size = Size::new(30.0, 30.0);
        let assets: Vec<_> = (0..3).map(|i| library.asset_at(i).unwrap()).collect();
        library.start_caching(
            &assets,
            size,
            ContentMode::AspectFill,
            &options(DeliveryMode::Opportunistic),
        );

        let mut waited = 0;
        while library.cached_thumbnail_count() < 3 && waited < 500 {
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert_eq!(library.cached_thumbnail_count(), 3);

        let (tx, rx) = crossbeam_channel::unbounded();
        library.request_image(
            assets[1],
            size,
            ContentMode::AspectFill,
            &options(DeliveryMode::Opportunistic),
            CompletionAllocator::new(&tx),
        );

        // No degraded image when the thumbnail is already warm
        let delivery = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(delivery.is_final);
        assert_eq!(library.stats().served_from_cache, 1);

        library.stop_caching(
            &assets[0..2],
            size,
            ContentMode::AspectFill,
            &options(DeliveryMode::Opportunistic),
        );
        assert_eq!(library.cached_thumbnail_count(), 1);

        library.stop_caching_all();
        assert_eq!(library.cached_thumbnail_count(), 0);
    }

    #[test]
    fn cancelled_load_never_completes() {
        let mut config = test_config();
        config.worker_count = 1;
        config.decode_latency = Duration::from_millis(50);
        let library = SimulatedPhotoLibrary::new(&config).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let handles: Vec<_> = (0..3)
            .map(|i| {
                library.request_image(
                    library.asset_at(i).unwrap(),
                    Size::new(30.0, 30.0),
                    ContentMode::AspectFill,
                    &options(DeliveryMode::HighQualityFormat),
                    CompletionAllocator::new(&tx),
                )
            })
            .collect();

        // The single worker is busy with the first load, the others are still queued
        library.cancel(handles[1]);
        library.cancel(handles[2]);

        let delivery = receive_final(&rx);
        assert_eq!(delivery.handle, handles[0]);

        let mut waited = 0;
        while library.active_request_count() > 0 && waited < 500 {
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(library.stats().cancelled_before_decode, 2);
    }

    #[test]
    fn library_reports_its_authorization() {
        let library = SimulatedPhotoLibrary::new(&test_config()).unwrap();
        assert_eq!(library.authorization_status(), AuthorizationStatus::Limited);
        assert!(library.authorization_status().grants_access());
    }
}
