//! Per-owner result store.
//!
//! Maps each alias to the last value fetched for it, together with the listener
//! subscriptions attached to the entities in that value. Replacing or removing a
//! value drops its subscriptions, so an (alias, entity, property) triple never has
//! more than one live listener.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::core::{Entity, Subscription};

/// A stored fetch result: one entity or a list of entities.
#[derive(Debug, Clone)]
pub enum Fetched {
    /// Single entity.
    One(Arc<Entity>),
    /// List of entities. The outer `Arc` is the identity compared on store.
    Many(Arc<[Arc<Entity>]>),
}

impl Fetched {
    /// Wrap a list of entities.
    pub fn many(entities: Vec<Arc<Entity>>) -> Self {
        Fetched::Many(entities.into())
    }

    /// Whether both values are the same reference.
    pub fn same_as(&self, other: &Fetched) -> bool {
        match (self, other) {
            (Fetched::One(a), Fetched::One(b)) => Arc::ptr_eq(a, b),
            (Fetched::Many(a), Fetched::Many(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The entity, for single results.
    pub fn as_one(&self) -> Option<&Arc<Entity>> {
        match self {
            Fetched::One(entity) => Some(entity),
            Fetched::Many(_) => None,
        }
    }

    /// The list, for list results.
    pub fn as_many(&self) -> Option<&[Arc<Entity>]> {
        match self {
            Fetched::One(_) => None,
            Fetched::Many(entities) => Some(entities),
        }
    }

    /// Every entity in the value.
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        match self {
            Fetched::One(entity) => vec![Arc::clone(entity)],
            Fetched::Many(entities) => entities.to_vec(),
        }
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        match self {
            Fetched::One(_) => 1,
            Fetched::Many(entities) => entities.len(),
        }
    }

    /// Whether this is an empty list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attribute of a single entity. Lists have no attributes.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.as_one().and_then(|entity| entity.get(name))
    }

    /// Read `name` as a fetch input: the attribute for a single entity, an array
    /// of each entity's attribute (null when missing) for a list.
    pub fn property_input(&self, name: &str) -> Value {
        match self {
            Fetched::One(entity) => entity.get(name).unwrap_or(Value::Null),
            Fetched::Many(entities) => Value::Array(
                entities.iter().map(|entity| entity.get(name).unwrap_or(Value::Null)).collect(),
            ),
        }
    }

    /// JSON snapshot: an object or an array of objects.
    pub fn to_json(&self) -> Value {
        match self {
            Fetched::One(entity) => entity.to_json(),
            Fetched::Many(entities) => Value::Array(entities.iter().map(|e| e.to_json()).collect()),
        }
    }
}

impl From<Arc<Entity>> for Fetched {
    fn from(entity: Arc<Entity>) -> Self {
        Fetched::One(entity)
    }
}

impl From<Vec<Arc<Entity>>> for Fetched {
    fn from(entities: Vec<Arc<Entity>>) -> Self {
        Fetched::many(entities)
    }
}

/// Alias → value map with the listeners attached to each value.
#[derive(Debug, Default)]
pub struct ResultStore {
    values: DashMap<String, Fetched>,
    listeners: DashMap<String, Vec<Subscription>>,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `alias`.
    pub fn get(&self, alias: &str) -> Option<Fetched> {
        self.values.get(alias).map(|entry| entry.value().clone())
    }

    /// Whether `alias` has a value.
    pub fn contains(&self, alias: &str) -> bool {
        self.values.contains_key(alias)
    }

    /// Store `value` for `alias`, returning the previous value.
    pub fn insert(&self, alias: &str, value: Fetched) -> Option<Fetched> {
        self.values.insert(alias.to_string(), value)
    }

    /// Remove `alias` and drop its listeners. Returns the removed value.
    pub fn remove(&self, alias: &str) -> Option<Fetched> {
        let removed = self.values.remove(alias).map(|(_, value)| value);
        self.clear_listeners(alias);
        removed
    }

    /// Replace the listeners held for `alias`.
    pub fn set_listeners(&self, alias: &str, subscriptions: Vec<Subscription>) {
        let previous = self.listeners.insert(alias.to_string(), subscriptions);
        drop(previous);
    }

    /// Drop the listeners held for `alias`.
    pub fn clear_listeners(&self, alias: &str) {
        let previous = self.listeners.remove(alias);
        drop(previous);
    }

    /// Number of listeners held for `alias`.
    pub fn listener_count(&self, alias: &str) -> usize {
        self.listeners.get(alias).map_or(0, |entry| entry.value().len())
    }

    /// Aliases with a value, sorted.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.values.iter().map(|entry| entry.key().clone()).collect();
        aliases.sort();
        aliases
    }

    /// Remove every value and listener.
    pub fn clear(&self) {
        let listeners: Vec<String> = self.listeners.iter().map(|entry| entry.key().clone()).collect();
        for alias in listeners {
            self.clear_listeners(&alias);
        }
        self.values.clear();
    }
}
