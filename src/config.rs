//! Configuration types for the tracker.
//!
//! Loads settings from config.json at startup. Provides the frame source,
//! sampling interval, OCR preprocessing parameters, and headless options.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::ocr::engine::LayoutHint;
use crate::selection::SelectionRect;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<TrackerConfig> = OnceLock::new();

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Live capture of a top-level window whose title contains `title` (Windows only).
    Window { title: String },
    /// Newest image file in a directory, e.g. a screen recorder's snapshot folder.
    Folder { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self::Window {
                title: "MapleStory Worlds".to_string(),
            }
        } else {
            Self::Folder {
                path: PathBuf::from("frames"),
            }
        }
    }
}

/// Complete tracker configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub source: SourceConfig,
    /// Interval between sampling ticks (milliseconds)
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Luminance threshold: pixels brighter than this become white
    #[serde(default = "default_ocr_threshold")]
    pub ocr_threshold: u8,
    /// Nearest-neighbor upscale factor applied before OCR
    #[serde(default = "default_upscale_factor")]
    pub upscale_factor: f32,
    /// Characters the OCR engine may emit
    #[serde(default = "default_ocr_whitelist")]
    pub ocr_whitelist: String,
    #[serde(default)]
    pub layout: LayoutHint,
    /// Selections narrower or shorter than this are not sampled
    #[serde(default = "default_min_selection_px")]
    pub min_selection_px: u32,
    /// Append accepted readings to a per-session CSV file
    #[serde(default = "default_record_history")]
    pub record_history: bool,
    /// Run without a window, using `selection` as the region
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub selection: Option<SelectionRect>,
    /// Headless telemetry output; stdout when absent
    #[serde(default)]
    pub telemetry_path: Option<PathBuf>,
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_ocr_threshold() -> u8 {
    180
}

fn default_upscale_factor() -> f32 {
    3.0
}

fn default_ocr_whitelist() -> String {
    "0123456789.".to_string()
}

fn default_min_selection_px() -> u32 {
    8
}

fn default_record_history() -> bool {
    true
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            sample_interval_ms: default_sample_interval_ms(),
            ocr_threshold: default_ocr_threshold(),
            upscale_factor: default_upscale_factor(),
            ocr_whitelist: default_ocr_whitelist(),
            layout: LayoutHint::default(),
            min_selection_px: default_min_selection_px(),
            record_history: default_record_history(),
            headless: false,
            selection: None,
            telemetry_path: None,
        }
    }
}

/// Loads configuration from `path`, falling back to defaults when the file
/// is missing or malformed.
pub fn load_config(path: &Path) -> TrackerConfig {
    tracing::info!("Looking for config at: {}", path.display());

    if !path.exists() {
        tracing::info!("config.json not found. Using default config.");
        return TrackerConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Failed to parse config.json: {}. Using defaults.", e);
                TrackerConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config.json: {}. Using defaults.", e);
            TrackerConfig::default()
        }
    }
}

/// Initializes the global configuration from the file next to the executable
/// and returns it. Later calls return the same instance.
pub fn init_config() -> &'static TrackerConfig {
    CONFIG.get_or_init(|| load_config(&crate::paths::get_config_path()))
}
