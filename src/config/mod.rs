//! Configuration for the irrigation data service
//!
//! Two kinds of configuration live here:
//!
//! 1. **Data model declarations** ([`DataModel`]) - what an owner needs, as literal
//!    values, TOML (`[[data_models]]` with camelCase keys), or builder calls that
//!    attach computed ids, criteria and custom fetchers.
//! 2. **CLI settings** ([`Settings`]) - page size, number of seeded readings and log
//!    level for the `irrigation` binary.
//!
//! # Modules
//!
//! - `data_model` - declaration schema and builder
//! - `parser` - generic TOML parsing with file context
//! - `settings` - settings file discovery and defaults
//!
//! # Settings Resolution
//!
//! The first of these that exists wins:
//!
//! 1. `--config <path>`
//! 2. `$IRRIGATION_CONFIG`
//! 3. `~/.irrigation/config.toml`
//! 4. Built-in defaults
//!
//! ```toml
//! page_size = 10
//! readings = 50
//! log_level = "info"
//! ```

pub mod data_model;
mod parser;
pub mod settings;

pub use data_model::{CustomFetcher, DataModel, DataModelFile, ValueFn, ValueSource};
pub use parser::parse_config;
pub use settings::Settings;
