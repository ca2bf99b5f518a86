//! Optional `trellis.toml` settings file

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Settings file looked up in the project root.
pub const SETTINGS_FILE: &str = "trellis.toml";

/// Project descriptor used when none is configured.
pub const DEFAULT_DESCRIPTOR: &str = "tsconfig.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Project descriptor, relative to the root unless absolute.
    pub descriptor: PathBuf,
    /// Window for coalescing file-change bursts. 0 disables coalescing.
    pub debounce_ms: u64,
    /// Recompute whenever a client attaches.
    pub recompute_on_attach: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        ProjectSettings {
            descriptor: PathBuf::from(DEFAULT_DESCRIPTOR),
            debounce_ms: 100,
            recompute_on_attach: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub project: ProjectSettings,
}

impl Settings {
    /// Load `trellis.toml` from `root`, or defaults if the file is absent.
    pub fn load(root: &Path) -> Result<Self, SettingsError> {
        let path = settings_path(root);
        if !path.exists() {
            tracing::debug!("No {} in {}, using defaults", SETTINGS_FILE, root.display());
            return Ok(Settings::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        let settings = toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Absolute path of the project descriptor.
    pub fn descriptor_path(&self, root: &Path) -> PathBuf {
        if self.project.descriptor.is_absolute() {
            self.project.descriptor.clone()
        } else {
            root.join(&self.project.descriptor)
        }
    }
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}
