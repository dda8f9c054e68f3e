//! Irrigation - moisture monitoring command-line tool
//!
//! Entry point: parses arguments, loads settings, installs the tracing subscriber
//! and runs the selected command. Failures are shown through the user-facing error
//! formatter and exit with status 1.

use anyhow::Result;
use clap::Parser;
use irrigation_cli::cli;
use irrigation_cli::core::user_friendly_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let outcome = match cli.settings() {
        Ok(settings) => {
            setup_tracing(&cli.log_filter(&settings));
            cli.execute_with_settings(settings).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        user_friendly_error(e).display();
        std::process::exit(1);
    }
    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over the command-line and configured level.
fn setup_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}
