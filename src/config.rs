//! Application settings
//!
//! Read once at startup from `<config_dir>/sportshot/config.json`.
//! Every key is optional; missing keys take their defaults, and a missing
//! or unreadable file falls back to `AppConfig::default()`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Directory name under the platform config dir
pub const APP_DIR: &str = "sportshot";

/// Which camera backend to use for selfies
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackend {
    /// Synthetic animated frames
    #[default]
    TestPattern,
    /// Behaves like a machine without a camera
    Unavailable,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraBackend,
    /// Simulated recognition latency
    pub recognition_delay_ms: u64,
    /// Upper bound on a single recognition call
    pub recognition_timeout_ms: u64,
    /// Make every recognition call fail
    pub simulate_recognition_failure: bool,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: u64,
    /// Longest edge of the confirm-screen preview, in pixels
    pub preview_size: u32,
    /// Number of photos in the mock catalog
    pub catalog_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraBackend::TestPattern,
            recognition_delay_ms: 2000,
            recognition_timeout_ms: 15_000,
            simulate_recognition_failure: false,
            max_upload_bytes: 10 * 1024 * 1024,
            preview_size: 384,
            catalog_size: 24,
        }
    }
}

impl AppConfig {
    /// Load settings from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let path = match config_dir() {
            Ok(dir) => dir.join("config.json"),
            Err(e) => {
                warn!("{e}; using default settings");
                return Self::default();
            }
        };

        match Self::load_from(&path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), "loaded settings");
                config
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    /// Read settings from `path`; `Ok(None)` if the file does not exist
    pub fn load_from(path: &Path) -> AppResult<Option<Self>> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::io(path, e)),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| AppError::json(path, e))
    }

    pub fn recognition_delay(&self) -> Duration {
        Duration::from_millis(self.recognition_delay_ms)
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_millis(self.recognition_timeout_ms)
    }
}

/// Get the per-user settings directory
///
/// - Linux: ~/.config/sportshot
/// - macOS: ~/Library/Application Support/sportshot
/// - Windows: %APPDATA%\sportshot
pub fn config_dir() -> AppResult<PathBuf> {
    let mut path = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or(AppError::NoConfigDir)?;
    path.push(APP_DIR);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "camera": "unavailable", "recognition_delay_ms": 10 }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap().unwrap();
        assert_eq!(config.camera, CameraBackend::Unavailable);
        assert_eq!(config.recognition_delay(), Duration::from_millis(10));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.catalog_size, 24);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, AppError::Json { .. }));
    }
}
