//! Declarative data requirement schema.
//!
//! A [`DataModel`] is one entry of an owner's `dataModels` list. The literal parts
//! (`alias`, types, literal ids or criteria, `idProperty`, `usePull`,
//! `dependencies`) deserialize from TOML with camelCase keys. The function-valued
//! parts (computed ids or criteria, custom fetchers) are attached with the builder
//! methods.
//!
//! ```toml
//! [[data_models]]
//! alias = "moisture"
//! collectionType = "moisture"
//! dependencies = ["view:page"]
//! criteria = { pagination = { page = 1, pageSize = 10 } }
//!
//! [[data_models]]
//! alias = "latest"
//! modelType = "moisture"
//! idProperty = "view:latestId"
//! usePull = true
//! ```

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::core::DataResult;
use crate::service::{DataService, FetchOptions, FetchOutcome};

/// Function computing an id, id list, or criteria from the owner's current state.
pub type ValueFn = Arc<dyn Fn(&DataService) -> Value + Send + Sync>;

/// Caller-supplied fetch function: `(service, alias, input, options)`.
pub type CustomFetcher =
    Arc<dyn Fn(&DataService, &str, &Value, &FetchOptions) -> DataResult<FetchOutcome> + Send + Sync>;

/// A literal value or a function of owner state.
#[derive(Clone)]
pub enum ValueSource {
    /// Fixed value.
    Literal(Value),
    /// Re-evaluated on every fetch attempt.
    Computed(ValueFn),
}

impl ValueSource {
    /// Evaluate against the owner's current state.
    pub fn evaluate(&self, service: &DataService) -> Value {
        match self {
            ValueSource::Literal(value) => value.clone(),
            ValueSource::Computed(f) => f(service),
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            ValueSource::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for ValueSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(ValueSource::Literal)
    }
}

/// One declared data requirement.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DataModel {
    /// Component-local name of the requirement.
    #[serde(default)]
    pub alias: Option<String>,
    /// Entity type for a single-entity alias.
    #[serde(default)]
    pub model_type: Option<String>,
    /// Entity type for a list alias.
    #[serde(default)]
    pub collection_type: Option<String>,
    /// Single id source.
    #[serde(default)]
    pub id: Option<ValueSource>,
    /// Id list source.
    #[serde(default)]
    pub ids: Option<ValueSource>,
    /// `parentAlias:propertyName` reference supplying the id(s).
    #[serde(default)]
    pub id_property: Option<String>,
    /// Free-form criteria source.
    #[serde(default)]
    pub criteria: Option<ValueSource>,
    /// Fetch only ids missing from the cache instead of re-requesting all of them.
    #[serde(default)]
    pub use_pull: bool,
    /// Extra `parentAlias:watchedProperty` edges.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Custom fetch function; replaces the built-in strategies.
    #[serde(skip)]
    pub fetcher: Option<CustomFetcher>,
}

impl DataModel {
    /// Start a declaration for `alias`.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::default()
        }
    }

    /// Fetch a single entity of `entity_type`.
    pub fn model_type(mut self, entity_type: impl Into<String>) -> Self {
        self.model_type = Some(entity_type.into());
        self
    }

    /// Fetch a list of entities of `entity_type`.
    pub fn collection_type(mut self, entity_type: impl Into<String>) -> Self {
        self.collection_type = Some(entity_type.into());
        self
    }

    /// Literal single id.
    pub fn id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(ValueSource::Literal(id.into()));
        self
    }

    /// Single id computed from owner state.
    pub fn id_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&DataService) -> Value + Send + Sync + 'static,
    {
        self.id = Some(ValueSource::Computed(Arc::new(f)));
        self
    }

    /// Literal id list.
    pub fn ids(mut self, ids: impl Into<Value>) -> Self {
        self.ids = Some(ValueSource::Literal(ids.into()));
        self
    }

    /// Id list computed from owner state.
    pub fn ids_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&DataService) -> Value + Send + Sync + 'static,
    {
        self.ids = Some(ValueSource::Computed(Arc::new(f)));
        self
    }

    /// Take the id(s) from `parentAlias:propertyName`.
    pub fn id_property(mut self, reference: impl Into<String>) -> Self {
        self.id_property = Some(reference.into());
        self
    }

    /// Literal criteria.
    pub fn criteria(mut self, criteria: impl Into<Value>) -> Self {
        self.criteria = Some(ValueSource::Literal(criteria.into()));
        self
    }

    /// Criteria computed from owner state.
    pub fn criteria_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&DataService) -> Value + Send + Sync + 'static,
    {
        self.criteria = Some(ValueSource::Computed(Arc::new(f)));
        self
    }

    /// Use pull mode for id-based retrieval.
    pub fn use_pull(mut self, use_pull: bool) -> Self {
        self.use_pull = use_pull;
        self
    }

    /// Add a `parentAlias:watchedProperty` dependency.
    pub fn depends_on(mut self, reference: impl Into<String>) -> Self {
        self.dependencies.push(reference.into());
        self
    }

    /// Replace the built-in strategies with `fetcher`.
    pub fn fetcher<F>(mut self, fetcher: F) -> Self
    where
        F: Fn(&DataService, &str, &Value, &FetchOptions) -> DataResult<FetchOutcome>
            + Send
            + Sync
            + 'static,
    {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Declared entity type, from `modelType` or `collectionType`.
    pub fn entity_type(&self) -> Option<&str> {
        self.model_type.as_deref().or(self.collection_type.as_deref())
    }
}

impl fmt::Debug for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataModel")
            .field("alias", &self.alias)
            .field("model_type", &self.model_type)
            .field("collection_type", &self.collection_type)
            .field("id", &self.id)
            .field("ids", &self.ids)
            .field("id_property", &self.id_property)
            .field("criteria", &self.criteria)
            .field("use_pull", &self.use_pull)
            .field("dependencies", &self.dependencies)
            .field("fetcher", &self.fetcher.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A file of data model declarations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataModelFile {
    /// Declarations in order.
    #[serde(default)]
    pub data_models: Vec<DataModel>,
}
