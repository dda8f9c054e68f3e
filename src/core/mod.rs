//! Core types shared by the cache, resolver and service layers
//!
//! # Modules
//!
//! - `entity` - [`Entity`], the observable shared record, and [`EntityId`]
//! - `error` - [`DataError`], [`ConfigProblem`] and user-facing [`ErrorContext`]
//! - `events` - [`EventHub`], the topic-based listener registry behind entity change
//!   events and data service notifications
//!
//! # Design Principles
//!
//! Every fallible operation returns a [`DataResult`] (library code) or
//! [`anyhow::Result`] (CLI and configuration loading). Listener registrations are
//! owned values ([`Subscription`]) so that dropping a stored value also drops the
//! listeners attached to it.

pub mod entity;
pub mod error;
pub mod events;

pub use entity::{CHANGE, Entity, EntityChange, EntityId, EntityRecord, change_topic};
pub use error::{ConfigProblem, DataError, DataResult, ErrorContext, user_friendly_error};
pub use events::{EventHub, Listener, Subscription};
