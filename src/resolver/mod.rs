//! Resolution of data model declarations into an executable alias plan.
//!
//! The resolver runs once per owner, at initialization. It turns the declarative
//! [`DataModel`](crate::config::DataModel) list into [`AliasSpec`]s and a
//! [`DependencyGraph`] over aliases.
//!
//! # Resolution Process
//!
//! 1. **Implicit roots**: `model` and `view` are registered first. Declaring either
//!    again is a duplicate.
//! 2. **Per declaration**: alias, type, id source and strategy are checked and fixed.
//!    Id source precedence is `id`/`ids`, then `idProperty`, then `criteria`, then a
//!    custom fetcher with no input.
//! 3. **Edges**: `idProperty` and `dependencies` entries become
//!    `parent → dependent` edges labelled with the watched property. Parents may be
//!    declared later in the list.
//! 4. **Validation**: unknown parents and cycles are reported alongside every
//!    per-declaration problem in one [`DataError::InvalidDataModels`](crate::core::DataError).
//!
//! # Example
//!
//! ```rust,ignore
//! use irrigation_cli::config::DataModel;
//! use irrigation_cli::resolver::parse_data_models;
//!
//! let models = vec![
//!     DataModel::new("plot").model_type("plot").id_property("view:plotId"),
//!     DataModel::new("sensors").collection_type("sensor").id_property("plot:sensorIds"),
//! ];
//! let parsed = parse_data_models(&models, &registry)?;
//! print!("{}", parsed.graph().to_tree_string("view"));
//! ```

pub mod alias_spec;
pub mod dependency_graph;

pub use alias_spec::{AliasSpec, Edge, FetchStrategy, IdSource, ParsedAliases, parse_data_models};
pub use dependency_graph::DependencyGraph;

#[cfg(test)]
mod tests;
