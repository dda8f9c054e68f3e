//! Irrigation - declarative data dependencies for moisture monitoring
//!
//! Components declare the data they need as named *aliases*. A per-component
//! [`DataService`](service::DataService) works out the dependency order between
//! them, fetches each alias through shared entity caches, and keeps results current
//! as the entities and view state they depend on change.
//!
//! # Architecture Overview
//!
//! - Entities live in one [`MasterCache`](cache::MasterCache) per entity type,
//!   shared by every component. Each component sees its own window of a master
//!   cache through a [`PrivateView`](cache::PrivateView).
//! - Data model declarations ([`DataModel`](config::DataModel)) are parsed into
//!   alias specs and a dependency graph by the [`resolver`].
//! - The [`service`] orchestrates fetches: roots first, then dependents whenever a
//!   watched property of a parent changes. Results land in a per-component result
//!   store and the owning component re-renders.
//!
//! ## Key Features
//!
//! - **Declarative**: an alias names its entity type and where its ids come from
//! - **Reactive**: property changes on parents re-fetch exactly the aliases that
//!   depend on them
//! - **Shared caching**: master caches deduplicate entities across components;
//!   pull mode skips ids already loaded
//! - **Complete diagnostics**: every configuration problem is reported at once
//!
//! # Core Modules
//!
//! - [`cache`] - master caches, private views and the transport contract
//! - [`config`] - data model declarations, settings and TOML loading
//! - [`core`] - entities, change events and error types
//! - [`resolver`] - alias spec parsing and the dependency graph
//! - [`service`] - the data service, fetch orchestration and result store
//! - [`moisture`] - moisture readings, an in-memory backend and the list owner
//! - [`cli`] - the `irrigation` command-line interface
//! - [`utils`] - name suggestions and reference parsing
//!
//! # Data Model Declarations
//!
//! ```toml
//! # One plot, chosen by the view's plotId
//! [[data_models]]
//! alias = "plot"
//! modelType = "plot"
//! idProperty = "view:plotId"
//!
//! # Its sensors, by the ids listed on the plot
//! [[data_models]]
//! alias = "sensors"
//! collectionType = "sensor"
//! idProperty = "plot:sensorIds"
//! usePull = true
//!
//! # A page of readings, re-fetched when the view's page changes
//! [[data_models]]
//! alias = "moisture"
//! collectionType = "moisture"
//! dependencies = ["view:page"]
//! criteria = { pagination = { page = 1, pageSize = 10 } }
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Show the second page of generated readings
//! irrigation list --page 2
//!
//! # Check a declarations file and print its dependency tree
//! irrigation validate models.toml
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod moisture;
pub mod resolver;
pub mod service;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
