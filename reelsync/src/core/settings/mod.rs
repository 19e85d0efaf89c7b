//! Settings Persistence System
//!
//! Provides persistent settings with:
//! - Atomic file writes (temp file + rename)
//! - Defaults for every missing field
//! - Environment variable overrides
//! - Clamping of out-of-range values
//!
//! Storage location: {config_dir}/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::{CoreError, CoreResult};

/// Settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variables consulted after the settings file
pub const ENV_API_KEY: &str = "REELSYNC_API_KEY";
pub const ENV_BASE_URL: &str = "REELSYNC_BASE_URL";
pub const ENV_DB_PATH: &str = "REELSYNC_DB_PATH";
pub const ENV_UPLOAD_DIR: &str = "REELSYNC_UPLOAD_DIR";
pub const ENV_OUTPUT_DIR: &str = "REELSYNC_OUTPUT_DIR";
pub const ENV_FFMPEG: &str = "REELSYNC_FFMPEG";
pub const ENV_FFPROBE: &str = "REELSYNC_FFPROBE";

/// Default application data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("reelsync"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub extraction: ExtractionSettings,

    #[serde(default)]
    pub ffmpeg: FFmpegSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            storage: StorageSettings::default(),
            remote: RemoteSettings::default(),
            extraction: ExtractionSettings::default(),
            ffmpeg: FFmpegSettings::default(),
        }
    }
}

impl Settings {
    /// Clamps settings so they are always usable.
    ///
    /// Bad values are corrected rather than rejected.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.remote.base_url = self.remote.base_url.trim().trim_end_matches('/').to_string();
        if self.remote.base_url.is_empty() {
            self.remote.base_url = default_base_url();
        }
        if self.remote.group_id.trim().is_empty() {
            self.remote.group_id = default_group_id();
        }
        if matches!(&self.remote.api_key, Some(key) if key.trim().is_empty()) {
            self.remote.api_key = None;
        }
        self.remote.request_timeout_secs = self.remote.request_timeout_secs.max(1);
        self.remote.upload_timeout_secs = self.remote.upload_timeout_secs.max(1);
        self.remote.download_timeout_secs = self.remote.download_timeout_secs.max(1);
        self.remote.chat_timeout_secs = self.remote.chat_timeout_secs.max(1);

        self.extraction.threshold = if self.extraction.threshold.is_finite() {
            self.extraction.threshold.clamp(0.0, 1.0)
        } else {
            default_threshold()
        };
        self.extraction.jpeg_quality = self.extraction.jpeg_quality.clamp(1, 100);
        self.extraction.frames_per_timestamp = self.extraction.frames_per_timestamp.max(1);
        self.extraction.max_frames = self.extraction.max_frames.max(1);
    }

    /// Applies overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.remote.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.remote.base_url = url;
        }
        if let Some(path) = get(ENV_DB_PATH) {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_UPLOAD_DIR) {
            self.storage.upload_dir = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_OUTPUT_DIR) {
            self.storage.output_dir = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_FFMPEG) {
            self.ffmpeg.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get(ENV_FFPROBE) {
            self.ffmpeg.ffprobe_path = Some(PathBuf::from(path));
        }
    }
}

/// Where the sync database, downloads and extracted frames live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding local videos
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Root under which each extraction job gets a directory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_db_path() -> PathBuf {
    default_data_dir().join("video_sync.db")
}

fn default_upload_dir() -> PathBuf {
    default_data_dir().join("uploads")
}

fn default_output_dir() -> PathBuf {
    default_data_dir().join("frames")
}

/// Remote catalog connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Group new uploads are assigned to
    #[serde(default = "default_group_id")]
    pub group_id: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_transfer_timeout")]
    pub upload_timeout_secs: u64,

    #[serde(default = "default_transfer_timeout")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            group_id: default_group_id(),
            request_timeout_secs: default_request_timeout(),
            upload_timeout_secs: default_transfer_timeout(),
            download_timeout_secs: default_transfer_timeout(),
            chat_timeout_secs: default_chat_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://vision-agent.api.reka.ai".to_string()
}

fn default_group_id() -> String {
    "default".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_transfer_timeout() -> u64 {
    300
}

fn default_chat_timeout() -> u64 {
    120
}

/// Frame extraction defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSettings {
    /// Scene-change sensitivity in [0, 1]; lower is more sensitive
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    #[serde(default = "default_frames_per_timestamp")]
    pub frames_per_timestamp: usize,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_frames: default_max_frames(),
            frames_per_timestamp: default_frames_per_timestamp(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_threshold() -> f64 {
    0.3
}

fn default_max_frames() -> usize {
    100
}

fn default_frames_per_timestamp() -> usize {
    3
}

fn default_jpeg_quality() -> u8 {
    90
}

/// Explicit binary locations; unset means auto-detect
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FFmpegSettings {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Settings manager for loading and saving settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager for the given config directory
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            settings_path: config_dir.as_ref().join(SETTINGS_FILE),
        }
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, then apply environment overrides
    pub fn load(&self) -> Settings {
        let mut settings = self.load_file();
        settings.apply_env_overrides();
        settings.normalize();
        settings
    }

    /// Load settings from disk only, returning defaults if missing or unreadable
    pub fn load_file(&self) -> Settings {
        if !self.settings_path.exists() {
            info!("Settings file not found, using defaults");
            return Settings::default();
        }

        let parsed = fs::read_to_string(&self.settings_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))
            .and_then(|content| {
                serde_json::from_str::<Settings>(&content)
                    .map_err(|e| format!("Failed to parse settings file: {}", e))
            });

        match parsed {
            Ok(mut settings) => {
                settings.normalize();
                settings
            }
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &Settings) -> CoreResult<Settings> {
        let mut normalized = settings.clone();
        normalized.normalize();

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&normalized)?;

        let temp_path = self.settings_path.with_extension("json.tmp");
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        // std::fs::rename does not overwrite on Windows
        if cfg!(windows) && self.settings_path.exists() {
            fs::remove_file(&self.settings_path)?;
        }
        fs::rename(&temp_path, &self.settings_path).map_err(|e| {
            CoreError::Internal(format!("Failed to finalize settings file: {}", e))
        })?;

        info!("Settings saved to {:?}", self.settings_path);
        Ok(normalized)
    }
}
