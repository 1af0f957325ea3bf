//! Application settings and configuration management

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Directory holding downloaded media files
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Maximum total size of the cache in bytes (0 = unlimited)
    #[serde(default)]
    pub cache_limit_bytes: u64,
    /// Maximum age of cached files in days (0 = unlimited)
    #[serde(default)]
    pub cache_limit_days: u64,
    /// Keep downloaded media after playback instead of deleting it
    #[serde(default)]
    pub save_media: bool,
    /// Protect auto-playlist downloads from cache eviction
    #[serde(default)]
    pub retain_autoplay: bool,
    /// Whether the auto-playlist feature is enabled at all
    #[serde(default)]
    pub auto_playlist: bool,
    /// Only allow playback of local files (disables remote resolvers)
    #[serde(default)]
    pub local_only: bool,
    /// Directories searched by the local-file resolver
    #[serde(default)]
    pub local_search_roots: Vec<PathBuf>,
    /// Initial playback volume (1.0 = unity gain)
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Render a terminal loudness meter while streaming
    #[serde(default)]
    pub meter_enabled: bool,
    /// Compute/redraw the meter every Nth frame
    #[serde(default = "default_meter_period")]
    pub meter_period: u32,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("audio_cache")
}

fn default_volume() -> f32 {
    1.0
}

fn default_meter_period() -> u32 {
    2
}

/// Error types for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    ParseError(String),
    ValidationError(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(s) => write!(f, "Parse error: {}", s),
            ConfigError::ValidationError(s) => write!(f, "Validation error: {}", s),
        }
    }
}

impl Error for ConfigError {}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            cache_dir: default_cache_dir(),
            cache_limit_bytes: 0,
            cache_limit_days: 0,
            save_media: false,
            retain_autoplay: false,
            auto_playlist: false,
            local_only: false,
            local_search_roots: Vec::new(),
            default_volume: default_volume(),
            meter_enabled: false,
            meter_period: default_meter_period(),
        }
    }
}

impl Settings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("melobot").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "Cache directory cannot be empty".to_string(),
            ));
        }

        if self.default_volume < 0.0 {
            return Err(ConfigError::ValidationError(
                "Default volume cannot be negative".to_string(),
            ));
        }

        if self.meter_period == 0 {
            return Err(ConfigError::ValidationError(
                "Meter period must be at least 1".to_string(),
            ));
        }

        if self.local_only && self.local_search_roots.is_empty() {
            return Err(ConfigError::ValidationError(
                "local_only requires at least one local search root".to_string(),
            ));
        }

        Ok(())
    }

    /// True when the retention map should be loaded and persisted at all.
    pub fn retention_active(&self) -> bool {
        self.retain_autoplay && self.auto_playlist && self.save_media
    }
}
