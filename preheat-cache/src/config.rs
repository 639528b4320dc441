use crate::{ContentMode, DeliveryMode, GridLayout, ImageRequestOptions, PreheatError, PreheatResult};
use preheat_base::Size;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "preheat_config.json";

// Largest accepted thumbnail width or height, in pixels
pub const MAX_THUMBNAIL_DIMENSION: f32 = 4096.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreheatConfig {
    // Height of the preheat window as a multiple of the visible height, centered on it
    pub window_multiplier: f32,
    // The window is only recomputed once its center has moved more than this fraction of the
    // visible height
    pub hysteresis_fraction: f32,
}

impl Default for PreheatConfig {
    fn default() -> Self {
        PreheatConfig {
            window_multiplier: 2.0,
            hysteresis_fraction: 1.0 / 3.0,
        }
    }
}

/// Settings fixed for the lifetime of a coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub thumbnail_size: Size,
    pub content_mode: ContentMode,
    pub request_options: ImageRequestOptions,
    pub preheat: PreheatConfig,
    pub layout: GridLayout,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let thumbnail_size = Size::new(30.0, 30.0);
        CoordinatorConfig {
            thumbnail_size,
            content_mode: ContentMode::AspectFill,
            request_options: ImageRequestOptions {
                delivery_mode: DeliveryMode::Opportunistic,
            },
            preheat: PreheatConfig::default(),
            layout: GridLayout {
                item_width: thumbnail_size.width,
                item_height: thumbnail_size.height,
                spacing: 0.0,
            },
        }
    }
}

// Every field is optional in the file, missing ones fall back to the defaults
#[derive(Serialize, Deserialize, Default)]
pub struct CoordinatorConfigJson {
    #[serde(default)]
    pub thumbnail_width: Option<f32>,
    #[serde(default)]
    pub thumbnail_height: Option<f32>,
    #[serde(default)]
    pub content_mode: Option<ContentMode>,
    #[serde(default)]
    pub delivery_mode: Option<DeliveryMode>,
    #[serde(default)]
    pub window_multiplier: Option<f32>,
    #[serde(default)]
    pub hysteresis_fraction: Option<f32>,
    #[serde(default)]
    pub item_spacing: Option<f32>,
}

impl CoordinatorConfig {
    pub fn from_json(json: CoordinatorConfigJson) -> PreheatResult<Self> {
        let mut config = CoordinatorConfig::default();

        if let Some(width) = json.thumbnail_width {
            config.thumbnail_size.width = width;
        }
        if let Some(height) = json.thumbnail_height {
            config.thumbnail_size.height = height;
        }
        if let Some(content_mode) = json.content_mode {
            config.content_mode = content_mode;
        }
        if let Some(delivery_mode) = json.delivery_mode {
            config.request_options.delivery_mode = delivery_mode;
        }
        if let Some(window_multiplier) = json.window_multiplier {
            config.preheat.window_multiplier = window_multiplier;
        }
        if let Some(hysteresis_fraction) = json.hysteresis_fraction {
            config.preheat.hysteresis_fraction = hysteresis_fraction;
        }

        // Grid cells are the size of the thumbnail
        config.layout = GridLayout {
            item_width: config.thumbnail_size.width,
            item_height: config.thumbnail_size.height,
            spacing: json.item_spacing.unwrap_or(0.0),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PreheatResult<()> {
        if self.thumbnail_size.width <= 0.0 || self.thumbnail_size.height <= 0.0 {
            return Err(PreheatError::StringError(format!(
                "thumbnail size must be positive, got {:?}",
                self.thumbnail_size
            )));
        }

        if self.thumbnail_size.width > MAX_THUMBNAIL_DIMENSION
            || self.thumbnail_size.height > MAX_THUMBNAIL_DIMENSION
        {
            return Err(PreheatError::StringError(format!(
                "thumbnail size must be at most {} on each side, got {:?}",
                MAX_THUMBNAIL_DIMENSION, self.thumbnail_size
            )));
        }

        if self.preheat.window_multiplier < 1.0 {
            return Err(PreheatError::StringError(format!(
                "window_multiplier must be at least 1.0, got {}",
                self.preheat.window_multiplier
            )));
        }

        if self.preheat.hysteresis_fraction < 0.0 {
            return Err(PreheatError::StringError(format!(
                "hysteresis_fraction must not be negative, got {}",
                self.preheat.hysteresis_fraction
            )));
        }

        if self.layout.spacing < 0.0 {
            return Err(PreheatError::StringError(format!(
                "item_spacing must not be negative, got {}",
                self.layout.spacing
            )));
        }

        Ok(())
    }

    pub fn read_from_path(path: &Path) -> PreheatResult<Self> {
        let file_contents = std::fs::read_to_string(path)?;
        let config_file: CoordinatorConfigJson = serde_json::from_str(&file_contents)?;
        Self::from_json(config_file)
    }

    /// Walks from `search_location` up through its parents looking for a config file
    pub fn locate_config_file(search_location: &Path) -> PreheatResult<Self> {
        let search_location = dunce::canonicalize(search_location)?;
        let mut path = Some(search_location.clone());
        while let Some(p) = path {
            let joined_path = p.join(CONFIG_FILE_NAME);
            if joined_path.exists() {
                log::info!("Using coordinator configuration at {:?}", joined_path);
                return Self::read_from_path(&joined_path);
            }

            path = p.parent().map(|x| x.to_path_buf());
        }

        Err(format!(
            "{} could not be located at {:?} or in any of its parent directories",
            CONFIG_FILE_NAME, search_location
        ))?
    }
}
