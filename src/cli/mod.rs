//! Command-line interface for the `irrigation` binary.
//!
//! # Commands
//!
//! - `list` - seed the in-memory moisture backend and print one page of readings
//! - `validate` - check a file of data model declarations and show its dependency tree
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` select the tracing level (mutually exclusive)
//! - `--config <PATH>` reads settings from an explicit file
//!
//! ```bash
//! irrigation list --page 2 --page-size 20
//! irrigation --verbose validate models.toml
//! irrigation validate models.toml --format json
//! ```

mod list;
pub mod validate;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;

/// Root command and global options.
#[derive(Parser, Debug)]
#[command(
    name = "irrigation",
    about = "Irrigation monitoring - browse moisture readings and check data model declarations",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a settings file (defaults to ~/.irrigation/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show one page of moisture readings
    List(list::ListCommand),

    /// Validate data model declarations
    Validate(validate::ValidateCommand),
}

impl Cli {
    /// Load settings and run the selected command.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be loaded or the command fails.
    pub async fn execute(self) -> Result<()> {
        let settings = self.settings()?;
        self.execute_with_settings(settings).await
    }

    /// Settings for this invocation, honoring `--config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit or discovered settings file is invalid.
    pub fn settings(&self) -> Result<Settings> {
        Settings::load(self.config.as_deref())
    }

    /// Tracing filter directive: `debug` with `--verbose`, `off` with `--quiet`,
    /// otherwise the configured level.
    #[must_use]
    pub fn log_filter(&self, settings: &Settings) -> String {
        if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "off".to_string()
        } else {
            settings.log_level.clone()
        }
    }

    /// Run the selected command with already loaded settings.
    ///
    /// # Errors
    ///
    /// Returns whatever error the command reports.
    pub async fn execute_with_settings(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::List(cmd) => cmd.execute(&settings).await,
            Commands::Validate(cmd) => cmd.execute(),
        }
    }
}
