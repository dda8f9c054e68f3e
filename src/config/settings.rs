//! Settings for the `irrigation` binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::parse_config;
use crate::constants::{CONFIG_DIR, CONFIG_ENV_VAR, CONFIG_FILE, DEFAULT_PAGE_SIZE, DEFAULT_READINGS};

/// User settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Rows per page for `irrigation list`.
    pub page_size: u64,
    /// Readings seeded into the in-memory backend.
    pub readings: usize,
    /// Default tracing filter when neither `--verbose`, `--quiet` nor `RUST_LOG` is set.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            readings: DEFAULT_READINGS,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, trying `explicit`, then `$IRRIGATION_CONFIG`, then the
    /// default path.
    ///
    /// An explicitly named file must exist. A missing file at the environment or
    /// default location falls through to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a file that was found cannot be read or parsed, or if
    /// `explicit` does not exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Settings file not found: {}", path.display());
            }
            return Self::load_from(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) {
            if path.exists() {
                return Self::load_from(&path);
            }
            tracing::debug!(path = %path.display(), "settings file from {CONFIG_ENV_VAR} not found");
        }

        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings: Settings = parse_config(path)?;
        settings.validate().with_context(|| format!("Invalid settings in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// `~/.irrigation/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page_size must be at least 1");
        }
        Ok(())
    }
}
