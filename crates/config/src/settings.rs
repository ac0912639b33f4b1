// Import settings
// Loaded from ~/.config/gridlink/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use gridlink_core::GridLimits;

/// Grid size mode, selected per document. Legacy documents keep the small
/// compatibility grid for their whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridMode {
    Legacy,
    #[default]
    Current,
}

impl GridMode {
    pub fn limits(&self) -> GridLimits {
        match self {
            GridMode::Legacy => GridLimits::legacy(),
            GridMode::Current => GridLimits::current(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Grid size mode for new documents
    pub grid_mode: GridMode,

    /// Delete staging sheets on disposal instead of leaving them visible
    pub hide_scratch_sheets: bool,

    /// Cap on rows copied per staging build. None = unlimited
    pub default_row_limit: Option<usize>,

    /// Skip columns with no data when copying ranges
    pub skip_empty_columns: bool,

    /// Re-run every stored binding when a document opens
    pub refresh_on_open: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grid_mode: GridMode::default(),
            hide_scratch_sheets: true,
            default_row_limit: None,
            skip_empty_columns: false,
            refresh_on_open: false,
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridlink")
            .join("settings.json")
    }

    /// Load settings, falling back to defaults if the file is missing or
    /// unreadable. Unknown fields are ignored.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &PathBuf) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let s = Settings::load_from(&PathBuf::from("/nonexistent/gridlink/settings.json"));
        assert_eq!(s.grid_mode, GridMode::Current);
        assert!(s.hide_scratch_sheets);
        assert_eq!(s.default_row_limit, None);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"grid_mode":"legacy","future_option":true,"default_row_limit":500}"#,
        )
        .unwrap();
        let s = Settings::load_from(&path);
        assert_eq!(s.grid_mode, GridMode::Legacy);
        assert_eq!(s.default_row_limit, Some(500));
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut s = Settings::default();
        s.grid_mode = GridMode::Legacy;
        s.default_row_limit = Some(100);
        s.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.grid_mode, GridMode::Legacy);
        assert_eq!(loaded.default_row_limit, Some(100));
    }

    #[test]
    fn grid_mode_limits() {
        assert_eq!(GridMode::Legacy.limits().max_cols, 256);
        assert_eq!(GridMode::Current.limits().max_rows, 1_048_576);
    }
}
