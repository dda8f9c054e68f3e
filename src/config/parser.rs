//! Generic configuration parsing utilities.
//!
//! Reads a TOML file and deserializes it into any [`serde::de::DeserializeOwned`]
//! type. Both failures carry the file path as context:
//!
//! ```text
//! Failed to parse config file: /path/to/models.toml
//! Caused by:
//!     unknown field `colectionType`
//! ```

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a TOML configuration file into `T`.
///
/// ```rust,ignore
/// use irrigation_cli::config::{DataModelFile, parse_config};
/// use std::path::Path;
///
/// let file: DataModelFile = parse_config(Path::new("models.toml"))?;
/// println!("{} declarations", file.data_models.len());
/// ```
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not match `T`.
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}
