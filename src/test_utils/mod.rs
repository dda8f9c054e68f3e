//! Test utilities for the irrigation data service
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests.
//!
//! - [`init_test_logging`] installs a once-only tracing subscriber that writes
//!   through the test harness.
//! - [`RecordingTransport`] is an in-memory [`Transport`](crate::cache::Transport)
//!   that records every call and can fail or delay on demand.
//! - [`RecordingOwner`] counts renders and lifecycle hook calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use irrigation_cli::cache::CacheRegistry;
//! use irrigation_cli::test_utils::{RecordingOwner, RecordingTransport, record};
//! use serde_json::json;
//!
//! let transport = RecordingTransport::with_records([record(1, json!({"name": "north"}))]);
//! let registry = CacheRegistry::new();
//! registry.register("plot", transport.clone());
//! let owner = RecordingOwner::new();
//! ```

mod owner;
mod transport;

pub use owner::RecordingOwner;
pub use transport::{RecordingTransport, record};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; does nothing when neither is
/// set. Safe to call from every test.
///
/// ```bash
/// RUST_LOG=irrigation_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
