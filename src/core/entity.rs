//! Observable entities and their identifiers.
//!
//! An [`Entity`] is a record with an [`EntityId`] and a JSON attribute map. Entities
//! are shared by reference (`Arc<Entity>`) between the master cache, private views,
//! and every result store that holds them, so a mutation made through one holder is
//! visible to all of them.
//!
//! Writing an attribute with a new value emits `change:<property>` for that property
//! and then a single `change` for the whole write. Writing an equal value is silent.
//!
//! ```rust,ignore
//! use irrigation_cli::core::{Entity, EntityId};
//! use serde_json::json;
//!
//! let plot = Entity::new(EntityId::from(7), json!({"name": "north"}).as_object().cloned().unwrap());
//! let _sub = plot.on("change:name", |change| println!("{} changed", change.property().unwrap_or("")));
//! plot.set("name", json!("north-east"));
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::events::{EventHub, Subscription};

/// Identifier of an entity within its entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id, as produced by the moisture database.
    Int(i64),
    /// Opaque string id.
    Str(String),
}

impl EntityId {
    /// Interpret a JSON value as an id.
    ///
    /// Integers and strings are ids; everything else (null, floats with a fraction,
    /// objects, arrays, booleans) is not.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EntityId::Int).or_else(|| {
                n.as_f64().filter(|f| f.fract() == 0.0).map(|f| EntityId::Int(f as i64))
            }),
            Value::String(s) if !s.is_empty() => Some(EntityId::Str(s.clone())),
            _ => None,
        }
    }

    /// JSON form of the id.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Int(n) => Value::from(*n),
            EntityId::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(n) => write!(f, "{n}"),
            EntityId::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Int(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Str(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId::Str(value)
    }
}

/// Plain data for one entity as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity id.
    pub id: EntityId,
    /// All other attributes.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl EntityRecord {
    /// Build a record from an id and attributes.
    pub fn new(id: impl Into<EntityId>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }
}

/// Change notification emitted by an [`Entity`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntityChange {
    /// A single attribute changed.
    Property {
        /// Attribute name.
        name: String,
        /// Previous value, `None` when the attribute was unset.
        previous: Option<Value>,
        /// New value, `None` when the attribute was removed.
        current: Option<Value>,
    },
    /// Summary event emitted once after any number of property changes.
    Any {
        /// Names of the attributes that changed.
        changed: Vec<String>,
    },
}

impl EntityChange {
    /// Name of the changed property for `Property` events.
    pub fn property(&self) -> Option<&str> {
        match self {
            EntityChange::Property { name, .. } => Some(name),
            EntityChange::Any { .. } => None,
        }
    }
}

/// Topic emitted after any attribute write that changed something.
pub const CHANGE: &str = "change";

/// Topic for a change of one attribute.
pub fn change_topic(property: &str) -> String {
    format!("{CHANGE}:{property}")
}

/// Shared observable record.
pub struct Entity {
    id: Option<EntityId>,
    attributes: DashMap<String, Value>,
    events: EventHub<EntityChange>,
}

impl Entity {
    /// Create an entity with an id.
    pub fn new(id: impl Into<EntityId>, attributes: Map<String, Value>) -> Arc<Self> {
        Arc::new(Self::build(Some(id.into()), attributes))
    }

    /// Create an entity without an id, such as an owner's view state.
    pub fn transient(attributes: Map<String, Value>) -> Arc<Self> {
        Arc::new(Self::build(None, attributes))
    }

    /// Create an entity from a transport record.
    pub fn from_record(record: EntityRecord) -> Arc<Self> {
        Self::new(record.id, record.attributes)
    }

    fn build(id: Option<EntityId>, attributes: Map<String, Value>) -> Self {
        Self {
            id,
            attributes: attributes.into_iter().collect(),
            events: EventHub::new(),
        }
    }

    /// Identifier, `None` for transient entities.
    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    /// Read an attribute. The `id` attribute falls back to the entity id.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.attributes.get(name) {
            Some(value) => Some(value.clone()),
            None if name == "id" => self.id.as_ref().map(EntityId::to_value),
            None => None,
        }
    }

    /// Write one attribute. Returns whether the value changed.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        let mut attrs = Map::new();
        attrs.insert(name.to_string(), value.into());
        !self.set_all(attrs).is_empty()
    }

    /// Write several attributes, emitting events for those that changed.
    ///
    /// Returns the names of the changed attributes.
    pub fn set_all(&self, attributes: Map<String, Value>) -> Vec<String> {
        let mut changes = Vec::new();
        for (name, value) in attributes {
            let previous = self.attributes.insert(name.clone(), value.clone());
            if previous.as_ref() != Some(&value) {
                changes.push(EntityChange::Property {
                    name,
                    previous,
                    current: Some(value),
                });
            }
        }
        self.publish(changes)
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn unset(&self, name: &str) -> bool {
        match self.attributes.remove(name) {
            Some((name, previous)) => {
                let changes = vec![EntityChange::Property {
                    name,
                    previous: Some(previous),
                    current: None,
                }];
                !self.publish(changes).is_empty()
            }
            None => false,
        }
    }

    fn publish(&self, changes: Vec<EntityChange>) -> Vec<String> {
        let changed: Vec<String> =
            changes.iter().filter_map(|c| c.property().map(str::to_string)).collect();
        for change in &changes {
            if let Some(name) = change.property() {
                self.events.emit(&change_topic(name), change);
            }
        }
        if !changed.is_empty() {
            self.events.emit(
                CHANGE,
                &EntityChange::Any {
                    changed: changed.clone(),
                },
            );
        }
        changed
    }

    /// Subscribe to `change` or `change:<property>`.
    #[must_use = "dropping the subscription immediately removes the listener"]
    pub fn on<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&EntityChange) + Send + Sync + 'static,
    {
        self.events.subscribe(topic, callback)
    }

    /// Number of listeners on `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.events.listener_count(topic)
    }

    /// JSON snapshot of the entity, including its id.
    pub fn to_json(&self) -> Value {
        let mut map: Map<String, Value> = self
            .attributes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        if let Some(id) = &self.id {
            map.entry("id").or_insert_with(|| id.to_value());
        }
        Value::Object(map)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity").field("id", &self.id).field("attributes", &self.to_json()).finish()
    }
}
