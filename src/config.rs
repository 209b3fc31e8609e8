//! Configuration for depot

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("depot")
}

/// Process mode: controls how loudly thumbnail failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Thumbnail failures logged at warn level only.
    Production,
    /// Thumbnail failures logged at error level with full detail.
    Diagnostic,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Production
    }
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root directory for stored uploads
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Process mode
    #[serde(default)]
    pub mode: Mode,

    /// Image upload settings
    #[serde(default)]
    pub image: ImageConfig,

    /// Generic file upload settings
    #[serde(default)]
    pub file: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Subdirectory for origin images
    #[serde(default = "default_image_path")]
    pub path: String,

    /// Maximum upload size in bytes
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Thumbnail settings
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Subdirectory for thumbnails
    #[serde(default = "default_thumbnail_path")]
    pub path: String,

    /// Bounding box width
    #[serde(default = "default_thumbnail_bound")]
    pub max_width: u32,

    /// Bounding box height
    #[serde(default = "default_thumbnail_bound")]
    pub max_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Subdirectory for generic files
    #[serde(default = "default_file_path")]
    pub path: String,

    /// Maximum upload size in bytes
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Allowed extensions (with leading dot). Empty = accept everything.
    #[serde(default)]
    pub allow_types: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_image_path() -> String {
    "image".to_string()
}

fn default_thumbnail_path() -> String {
    "thumbnail".to_string()
}

fn default_file_path() -> String {
    "file".to_string()
}

fn default_thumbnail_bound() -> u32 {
    300
}

fn default_max_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            path: default_image_path(),
            max_size: default_max_size(),
            thumbnail: ThumbnailConfig::default(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            path: default_thumbnail_path(),
            max_width: default_thumbnail_bound(),
            max_height: default_thumbnail_bound(),
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: default_file_path(),
            max_size: default_max_size(),
            allow_types: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage_dir: default_storage_dir(),
            mode: Mode::default(),
            image: ImageConfig::default(),
            file: FileConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get origin-image directory
    pub fn image_dir(&self) -> PathBuf {
        self.storage_dir.join(&self.image.path)
    }

    /// Get thumbnail directory
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.storage_dir.join(&self.image.thumbnail.path)
    }

    /// Get generic-file directory
    pub fn file_dir(&self) -> PathBuf {
        self.storage_dir.join(&self.file.path)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
