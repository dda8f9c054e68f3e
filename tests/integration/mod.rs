//! Integration test suite for irrigation
//!
//! End-to-end tests that drive the library through its public API and the
//! `irrigation` binary through `assert_cmd`.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: `list` and `validate` commands, global flags
//! - **config**: settings files and data model files on disk
//! - **data_service**: alias resolution, propagation, caching and disposal
//! - **moisture**: the moisture backend and list owner end to end

mod cli;
mod config;
mod data_service;
mod moisture;
