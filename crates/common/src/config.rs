//! Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Stock frame delay (milliseconds), roughly 12 frames per second.
pub const DEFAULT_DELAY_MS: u32 = 83;

/// Longest side of a cached thumbnail, in pixels.
pub const THUMBNAIL_SIZE: u32 = 100;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Playback defaults.
    pub playback: PlaybackDefaults,

    /// GIF export defaults.
    pub export: ExportDefaults,

    /// Directory watching.
    pub watcher: WatcherConfig,

    /// Per-directory project sidecar.
    pub project: ProjectConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default playback parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Delay applied to frames without an override.
    pub default_delay_ms: u32,

    /// How often the presentation loop polls the scheduler.
    pub tick_interval_ms: u64,

    /// Longest side of generated thumbnails.
    pub thumbnail_size: u32,
}

/// Default GIF export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Delay for frames without an override.
    pub delay_ms: u32,

    /// Whether the exported GIF loops forever.
    pub looping: bool,

    /// Disposal method name (`unspecified`, `do_not_dispose`,
    /// `restore_to_background`, `restore_to_previous`).
    pub disposal: String,

    /// Upper bound on waiting for a frame that is still loading.
    pub load_timeout_secs: u64,

    /// NeuQuant sampling speed, 1 (best) to 30 (fastest).
    pub quantize_speed: i32,
}

/// Filesystem watcher parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Capacity of the inbox between the watch thread and the control thread.
    /// When it fills up the watcher reports an overflow.
    pub inbox_capacity: usize,
}

/// Project sidecar parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// File name of the sidecar inside the animation directory.
    pub sidecar_file_name: String,

    /// Save the sidecar when a directory is closed.
    pub autosave: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "framereel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            default_delay_ms: DEFAULT_DELAY_MS,
            tick_interval_ms: 16,
            thumbnail_size: THUMBNAIL_SIZE,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            looping: true,
            disposal: "restore_to_background".to_string(),
            load_timeout_secs: 30,
            quantize_speed: 10,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 1024,
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            sidecar_file_name: "framereel.json".to_string(),
            autosave: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            return Self::load_from(&config_path);
        }
        Self::default()
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, e);
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("framereel").join("config.json")
}
