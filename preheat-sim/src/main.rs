mod library;
mod surface;

use library::{SimulatedLibraryConfig, SimulatedPhotoLibrary};
use preheat_cache::{
    CacheCoordinator, CoordinatorConfig, PermissionGate, PreheatResult, Rect,
    StaticPermissionGate, ViewportEvent,
};
use std::path::Path;
use std::time::Duration;
use surface::GridSurface;

const FRAME_DURATION: Duration = Duration::from_millis(16);
const VISIBLE_ROWS: f32 = 12.0;
const COLUMNS: usize = 4;

// Frames to keep pumping after the script ends so outstanding loads can land
const SETTLE_FRAMES: usize = 120;

fn load_config() -> PreheatResult<CoordinatorConfig> {
    if let Some(path) = std::env::args().nth(1) {
        log::info!("Loading config from {}", path);
        return CoordinatorConfig::read_from_path(Path::new(&path));
    }

    let current_dir = std::env::current_dir()?;
    match CoordinatorConfig::locate_config_file(&current_dir) {
        Ok(config) => Ok(config),
        Err(e) => {
            log::info!("{}, using default config", e);
            Ok(CoordinatorConfig::default())
        }
    }
}

// Fast flick to the bottom, then a slow drag back to the top
fn scroll_script(max_offset: f32) -> Vec<f32> {
    let mut offsets = Vec::default();
    let mut offset = 0.0;
    while offset < max_offset {
        offsets.push(offset);
        offset += 220.0;
    }

    offset = max_offset;
    while offset > 0.0 {
        offsets.push(offset);
        offset -= 45.0;
    }
    offsets.push(0.0);
    offsets
}

fn main() {
    // Setup logging
    env_logger::Builder::default()
        .write_style(env_logger::WriteStyle::Always)
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Could not load config: {}", e);
            return;
        }
    };

    let library = match SimulatedPhotoLibrary::new(&SimulatedLibraryConfig::default()) {
        Ok(library) => library,
        Err(e) => {
            log::error!("Could not start the simulated library: {}", e);
            return;
        }
    };

    // The library answers the permission question before the coordinator takes ownership of it
    let gate = StaticPermissionGate(library.authorization_status());

    let mut coordinator = CacheCoordinator::new(library, config);
    if let Err(e) = coordinator.initialize_with_gate(&gate) {
        log::error!("{}", e);
        return;
    }

    let layout = coordinator.config().layout;

    let asset_count = coordinator.catalog().map(|x| x.len()).unwrap_or(0);
    let content_width =
        COLUMNS as f32 * layout.item_width + (COLUMNS - 1) as f32 * layout.spacing;
    let content_size = layout.content_size(content_width, asset_count);
    let visible_height = VISIBLE_ROWS * layout.row_pitch();
    let max_offset = (content_size.height - visible_height).max(0.0);

    let mut surface = GridSurface::default();
    let offsets = scroll_script(max_offset);
    log::info!(
        "Scrolling {} frames over {} assets ({}x{} content)",
        offsets.len(),
        asset_count,
        content_size.width,
        content_size.height
    );

    for offset in offsets {
        profiling::scope!("frame");
        let event = ViewportEvent::new(
            Rect::new(0.0, offset, content_width, visible_height),
            content_size,
        );
        let update = coordinator.on_grid_viewport_changed(event);
        surface.show_range(&mut coordinator, update.visible);
        coordinator.update(&mut surface);

        profiling::finish_frame!();
        std::thread::sleep(FRAME_DURATION);
    }

    for _ in 0..SETTLE_FRAMES {
        if coordinator.ledger().active_load_count() == 0 {
            break;
        }
        coordinator.update(&mut surface);
        std::thread::sleep(FRAME_DURATION);
    }

    surface.unbind_all(&mut coordinator);
    coordinator.reset_cached_assets();

    let stats = *coordinator.stats();
    log::info!(
        "coordinator: {} requests, {} cancels, {} duplicate binds, {} window updates",
        stats.requests_issued,
        stats.requests_cancelled,
        stats.duplicate_binds,
        stats.window_updates
    );
    log::info!(
        "coordinator: {} images delivered ({} absent), {} stale deliveries dropped",
        stats.images_delivered,
        stats.absent_images_delivered,
        stats.stale_deliveries_dropped
    );
    log::info!("surface: {:?}", surface.stats());

    let library_stats = coordinator.adapter().stats();
    log::info!("library: {:?}", library_stats);
}
