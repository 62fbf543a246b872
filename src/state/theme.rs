//! Light/dark appearance preference
//!
//! The preference is stored as JSON next to the settings file and owned by
//! the application state; nothing reads it from global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Persisted form of the preference
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
struct StoredTheme {
    dark: bool,
}

/// The current appearance and where it is saved
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeContext {
    dark: bool,
    /// Where `toggle` persists the preference; `None` keeps it in memory only
    path: Option<PathBuf>,
}

impl ThemeContext {
    /// Initialise from the stored preference at `path`
    ///
    /// Falls back to dark when nothing is stored or the file is unreadable.
    pub fn load(path: Option<PathBuf>) -> Self {
        let dark = match path.as_deref().map(read_preference) {
            Some(Ok(Some(dark))) => dark,
            Some(Err(e)) => {
                warn!("{e}; using the dark theme");
                true
            }
            _ => true,
        };
        ThemeContext { dark, path }
    }

    /// A context that never touches disk
    pub fn in_memory(dark: bool) -> Self {
        ThemeContext { dark, path: None }
    }

    pub fn is_dark(&self) -> bool {
        self.dark
    }

    /// Flip the preference and persist it
    pub fn toggle(&mut self) -> AppResult<()> {
        self.set_dark(!self.dark)
    }

    pub fn set_dark(&mut self, dark: bool) -> AppResult<()> {
        self.dark = dark;
        if let Some(path) = &self.path {
            write_preference(path, dark)?;
            debug!(dark, "saved theme preference");
        }
        Ok(())
    }

    pub fn iced_theme(&self) -> iced::Theme {
        if self.dark {
            iced::Theme::Dark
        } else {
            iced::Theme::Light
        }
    }
}

fn read_preference(path: &Path) -> AppResult<Option<bool>> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::io(path, e)),
    };
    let stored: StoredTheme = serde_json::from_str(&json).map_err(|e| AppError::json(path, e))?;
    Ok(Some(stored.dark))
}

fn write_preference(path: &Path, dark: bool) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
    }
    let json = serde_json::to_string(&StoredTheme { dark }).map_err(|e| AppError::json(path, e))?;
    std::fs::write(path, json).map_err(|e| AppError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_dark() {
        let dir = tempfile::tempdir().unwrap();
        let theme = ThemeContext::load(Some(dir.path().join("theme.json")));
        assert!(theme.is_dark());
        assert_eq!(theme.iced_theme(), iced::Theme::Dark);
    }

    #[test]
    fn test_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("theme.json");

        let mut theme = ThemeContext::load(Some(path.clone()));
        theme.toggle().unwrap();
        assert!(!theme.is_dark());

        // A fresh context picks up the saved preference
        let reloaded = ThemeContext::load(Some(path));
        assert!(!reloaded.is_dark());
        assert_eq!(reloaded.iced_theme(), iced::Theme::Light);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_dark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");
        std::fs::write(&path, "dark please").unwrap();
        assert!(ThemeContext::load(Some(path)).is_dark());
    }

    #[test]
    fn test_in_memory_toggle() {
        let mut theme = ThemeContext::in_memory(false);
        theme.toggle().unwrap();
        assert!(theme.is_dark());
    }
}
