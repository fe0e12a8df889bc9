//! Persisted user defaults
//!
//! Stored as JSON in `<data dir>/WMA Lossless Encoder/settings.json`.
//! Every field has a default so older or hand-edited files still load.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{EncodingMode, EncodingParameters, ParameterError};
use crate::conversion::{OutputMode, DEFAULT_CONCURRENCY};

const APP_DIR_NAME: &str = "WMA Lossless Encoder";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not determine data directory")]
    NoDataDir,
    #[error("settings I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where output files go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputModeKind {
    /// A single user-chosen directory
    Custom,
    /// Next to each input file
    SameAsInput,
    /// A named subfolder next to each input file
    #[default]
    Subfolder,
}

/// How encoding parameters are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingModeKind {
    /// Fixed bit depth and sample rate for every file
    #[default]
    Manual,
    /// Probe each file and round up to the nearest supported tier
    Auto,
}

/// Application-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Maximum simultaneous encodes
    pub concurrency: usize,
    pub encoding_mode: EncodingModeKind,
    pub bit_depth: u32,
    pub sample_rate_khz: u32,
    pub output_mode: OutputModeKind,
    /// Target directory for `custom` output mode
    pub output_dir: Option<PathBuf>,
    pub subfolder_name: String,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            encoding_mode: EncodingModeKind::Manual,
            bit_depth: 16,
            sample_rate_khz: 48,
            output_mode: OutputModeKind::Subfolder,
            output_dir: None,
            subfolder_name: "WMA".to_string(),
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl AppSettings {
    const SETTINGS_FILE: &'static str = "settings.json";

    /// Get the app data directory, creating it if needed
    fn get_app_data_dir() -> Result<PathBuf, SettingsError> {
        let app_dir = dirs::data_dir()
            .ok_or(SettingsError::NoDataDir)?
            .join(APP_DIR_NAME);

        if !app_dir.exists() {
            std::fs::create_dir_all(&app_dir).map_err(|source| SettingsError::Io {
                path: app_dir.clone(),
                source,
            })?;
        }

        Ok(app_dir)
    }

    /// Default location of the settings file
    pub fn settings_path() -> Result<PathBuf, SettingsError> {
        Ok(Self::get_app_data_dir()?.join(Self::SETTINGS_FILE))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path().and_then(|path| Self::load_from(&path)) {
            Ok(settings) => {
                log::debug!("Loaded settings from disk");
                settings
            }
            Err(e) => {
                log::debug!("Using default settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::settings_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Manual bit depth / sample rate as validated parameters
    pub fn manual_parameters(&self) -> Result<EncodingParameters, ParameterError> {
        EncodingParameters::new(self.bit_depth, self.sample_rate_khz)
    }

    pub fn encoding_mode(&self) -> Result<EncodingMode, ParameterError> {
        let params = self.manual_parameters()?;
        Ok(match self.encoding_mode {
            EncodingModeKind::Manual => EncodingMode::Manual(params),
            EncodingModeKind::Auto => EncodingMode::Auto { fallback: params },
        })
    }

    pub fn output_mode(&self) -> OutputMode {
        match self.output_mode {
            OutputModeKind::Custom => OutputMode::Custom {
                directory: self.output_dir.clone(),
            },
            OutputModeKind::SameAsInput => OutputMode::SameAsInput,
            OutputModeKind::Subfolder => OutputMode::Subfolder {
                name: self.subfolder_name.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.encoding_mode, EncodingModeKind::Manual);
        assert_eq!(settings.manual_parameters().unwrap(), EncodingParameters::default());
        assert_eq!(
            settings.output_mode(),
            OutputMode::Subfolder {
                name: "WMA".to_string()
            }
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let settings = AppSettings {
            concurrency: 2,
            encoding_mode: EncodingModeKind::Auto,
            bit_depth: 24,
            sample_rate_khz: 96,
            output_mode: OutputModeKind::Custom,
            output_dir: Some(PathBuf::from("/music/wma")),
            ..AppSettings::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "concurrency": 8, "output_mode": "same-as-input" }"#).unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded.concurrency, 8);
        assert_eq!(loaded.output_mode, OutputModeKind::SameAsInput);
        assert_eq!(loaded.subfolder_name, "WMA");
        assert_eq!(loaded.bit_depth, 16);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = AppSettings::load_from(Path::new("/nonexistent/settings.json"));
        assert!(matches!(result, Err(SettingsError::Io { .. })));
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn test_encoding_mode_auto_carries_fallback() {
        let settings = AppSettings {
            encoding_mode: EncodingModeKind::Auto,
            bit_depth: 24,
            sample_rate_khz: 44,
            ..AppSettings::default()
        };
        let expected = EncodingParameters::new(24, 44).unwrap();
        assert_eq!(
            settings.encoding_mode().unwrap(),
            EncodingMode::Auto { fallback: expected }
        );
    }

    #[test]
    fn test_encoding_mode_rejects_bad_manual_values() {
        let settings = AppSettings {
            sample_rate_khz: 22,
            ..AppSettings::default()
        };
        assert!(settings.encoding_mode().is_err());
    }
}
