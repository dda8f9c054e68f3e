//! Constants shared across the irrigation codebase.
//!
//! Names, limits and defaults that more than one module depends on live here so
//! that the CLI, the moisture backend and the data service agree on them.

/// Alias of the owner's bound model, always present.
pub const MODEL_ALIAS: &str = "model";

/// Alias of the owner's view state, always present.
pub const VIEW_ALIAS: &str = "view";

/// Aliases the data service manages itself.
pub const RESERVED_ALIASES: [&str; 2] = [MODEL_ALIAS, VIEW_ALIAS];

/// Entity type served by the moisture backend.
pub const MOISTURE_TYPE: &str = "moisture";

/// Largest raw reading a moisture sensor reports.
pub const MAX_MOISTURE: u16 = 1024;

/// Page size when criteria omit one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Readings seeded into the in-memory backend by the CLI.
pub const DEFAULT_READINGS: usize = 50;

/// Environment variable naming a settings file.
pub const CONFIG_ENV_VAR: &str = "IRRIGATION_CONFIG";

/// Directory under the home directory holding the default settings file.
pub const CONFIG_DIR: &str = ".irrigation";

/// Settings file name.
pub const CONFIG_FILE: &str = "config.toml";
