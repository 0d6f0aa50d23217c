//! Configuration for the catalog pipeline
//!
//! [`CatalogConfig`] is the runtime configuration handed to every stage.
//! [`Settings`] is the user-editable `config.toml` stored in the data
//! directory; it supplies the movie roots and service credentials.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

/// Files at or below this size are skipped (samples, trailers, subtitles)
pub const DEFAULT_MIN_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Default metadata service endpoint
pub const DEFAULT_OMDB_URL: &str = "http://www.omdbapi.com/";

/// Default timeout for a metadata service request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Application directory name under the platform data directory
pub const APP_DIR_NAME: &str = "movies_db";

/// Settings file name inside the data directory
pub const SETTINGS_FILE_NAME: &str = "config.toml";

/// Known video container and codec extensions (dot-prefixed, case-sensitive)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".3g2", ".3gp", ".3gp2", ".3gpp", ".60d", ".ajp", ".asf", ".asx", ".avchd", ".avi", ".bik",
    ".bix", ".box", ".cam", ".dat", ".divx", ".dmf", ".dv", ".dvr-ms", ".evo", ".flc", ".fli",
    ".flic", ".flv", ".flx", ".gvi", ".gvp", ".h264", ".m1v", ".m2p", ".m2ts", ".m2v", ".m4e",
    ".m4v", ".mjp", ".mjpeg", ".mjpg", ".mkv", ".moov", ".mov", ".movhd", ".movie", ".movx",
    ".mp4", ".mpe", ".mpeg", ".mpg", ".mpv", ".mpv2", ".mxf", ".nsv", ".nut", ".ogg", ".ogm",
    ".omf", ".ps", ".qt", ".ram", ".rm", ".rmvb", ".swf", ".ts", ".vfw", ".vid", ".video", ".viv",
    ".vivo", ".vob", ".vro", ".wm", ".wmv", ".wmx", ".wrap", ".wvx", ".wx", ".x264", ".xvid",
];

/// Runtime configuration shared by all stages
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Root directories to scan, in order
    pub roots: Vec<PathBuf>,

    /// Dot-prefixed extension allow-list
    pub extensions: HashSet<String>,

    /// Files must be strictly larger than this to be cataloged
    pub min_file_size: u64,

    /// Directory holding settings and checkpoints
    pub data_dir: PathBuf,

    /// Write checkpoints pretty-printed
    pub debug: bool,

    /// Emit JSON progress lines on stderr
    pub show_progress: bool,

    /// Metadata service endpoint
    pub omdb_url: String,

    /// API key appended to metadata requests when set
    pub omdb_api_key: Option<String>,

    /// Timeout for one metadata request
    pub request_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extensions: Self::default_extensions(),
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            data_dir: PathBuf::from(APP_DIR_NAME),
            debug: false,
            show_progress: false,
            omdb_url: DEFAULT_OMDB_URL.to_string(),
            omdb_api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl CatalogConfig {
    /// Create a new config with the given root directories
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::new()
    }

    /// Get the default video extensions
    pub fn default_extensions() -> HashSet<String> {
        VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    /// Check if a dot-prefixed extension is allowed. Matching is exact.
    pub fn should_include_extension(&self, ext: &str) -> bool {
        self.extensions.contains(ext)
    }

    /// Check if a file is large enough to be a feature
    pub fn is_large_enough(&self, size: u64) -> bool {
        size > self.min_file_size
    }

    /// Directory holding the checkpoint files
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join("UserData")
    }

    /// Path of the settings file
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    /// Merge persisted settings. Explicit roots win over `movies_paths`.
    pub fn apply_settings(mut self, settings: Settings) -> Self {
        if self.roots.is_empty() {
            self.roots = settings.movies_paths;
        }
        if self.omdb_api_key.is_none() {
            self.omdb_api_key = settings.omdb_api_key;
        }
        if let Some(timeout) = settings.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        self
    }
}

/// Resolve the data directory: explicit value, else the platform default
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf, CatalogError> {
    match explicit {
        Some(dir) => Ok(dir),
        None => dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .ok_or(CatalogError::NoDataDir),
    }
}

/// User settings persisted as TOML
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directories holding movie files
    pub movies_paths: Vec<PathBuf>,

    /// Metadata service API key
    pub omdb_api_key: Option<String>,

    /// Override for the request timeout
    pub request_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// A missing file yields defaults. A file that exists but cannot be
    /// read or parsed is an error: scanning with no roots would silently
    /// produce an empty checkpoint.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            log::info!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| CatalogError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let settings = toml::from_str(&contents).map_err(|e| CatalogError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }
}

/// Builder for CatalogConfig
#[derive(Debug, Default)]
pub struct CatalogConfigBuilder {
    config: CatalogConfig,
}

impl CatalogConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root directories
    pub fn roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.config.roots = roots;
        self
    }

    /// Add a root directory
    pub fn add_root(mut self, root: PathBuf) -> Self {
        self.config.roots.push(root);
        self
    }

    /// Set the size threshold in bytes
    pub fn min_file_size(mut self, size: u64) -> Self {
        self.config.min_file_size = size;
        self
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.config.data_dir = dir;
        self
    }

    /// Pretty-print checkpoints
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Enable or disable progress output
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    /// Set the metadata service endpoint
    pub fn omdb_url(mut self, url: impl Into<String>) -> Self {
        self.config.omdb_url = url.into();
        self
    }

    /// Set the metadata service API key
    pub fn omdb_api_key(mut self, key: Option<String>) -> Self {
        self.config.omdb_api_key = key;
        self
    }

    /// Set the request timeout
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build the config
    pub fn build(self) -> CatalogConfig {
        self.config
    }
}
