//! Normalization of data model declarations into alias specs.
//!
//! [`parse_data_models`] validates an owner's declarations against the cache
//! registry, decides each alias's id source and fetch strategy once, and wires the
//! dependency edges. Every problem found is collected; the result is either a
//! complete [`ParsedAliases`] or one [`DataError::InvalidDataModels`] listing all of
//! them.

use std::collections::HashMap;
use std::fmt;

use super::dependency_graph::DependencyGraph;
use crate::cache::{CacheRegistry, RetrievalMode};
use crate::config::{CustomFetcher, DataModel, ValueSource};
use crate::constants::RESERVED_ALIASES;
use crate::core::{ConfigProblem, DataError, DataResult};
use crate::utils::{closest_match, split_reference};

/// A `parent → dependent` edge watching one property of the parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Alias whose stored entities are watched.
    pub parent: String,
    /// Alias re-fetched when the property changes.
    pub dependent: String,
    /// Watched property name.
    pub property: String,
}

/// Where an alias's fetch input comes from.
#[derive(Debug, Clone)]
pub enum IdSource {
    /// `id`, `ids` or `criteria`, literal or computed.
    Value(ValueSource),
    /// `idProperty`: a property of another alias's stored value.
    Property {
        /// Parent alias.
        parent: String,
        /// Property read from the parent's entities.
        property: String,
    },
    /// Custom fetcher with no declared input; always fetches with `true`.
    Always,
    /// `model` and `view`, bound by the service itself.
    Implicit,
    /// No input at all; the alias never fetches.
    None,
}

/// How an alias is fetched, decided once at parse time.
#[derive(Clone)]
pub enum FetchStrategy {
    /// One entity by id.
    ById,
    /// A list of entities by id.
    ByIds,
    /// A list of entities by criteria.
    ByCriteria,
    /// One entity by criteria.
    ByCriteriaSingle,
    /// Caller-supplied fetcher.
    Custom(CustomFetcher),
    /// `model` and `view`; never fetched, only propagated.
    Implicit,
}

impl FetchStrategy {
    /// Short strategy name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            FetchStrategy::ById => "by_id",
            FetchStrategy::ByIds => "by_ids",
            FetchStrategy::ByCriteria => "by_criteria",
            FetchStrategy::ByCriteriaSingle => "by_criteria_single",
            FetchStrategy::Custom(_) => "custom",
            FetchStrategy::Implicit => "implicit",
        }
    }
}

impl fmt::Debug for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized form of one declared (or implicit) alias.
#[derive(Debug, Clone)]
pub struct AliasSpec {
    /// Alias name.
    pub alias: String,
    /// Entity type fetched, if any.
    pub entity_type: Option<String>,
    /// Whether the alias yields a list.
    pub is_collection: bool,
    /// Whether identity is expressed by criteria.
    pub is_criteria: bool,
    /// Id-based retrieval mode.
    pub retrieval_mode: RetrievalMode,
    /// Input source.
    pub id_source: IdSource,
    /// Fetch strategy.
    pub strategy: FetchStrategy,
    /// Edges this alias depends on.
    pub parents: Vec<Edge>,
    /// Edges depending on this alias.
    pub dependents: Vec<Edge>,
}

impl AliasSpec {
    fn implicit(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            entity_type: None,
            is_collection: false,
            is_criteria: false,
            retrieval_mode: RetrievalMode::AlwaysFetch,
            id_source: IdSource::Implicit,
            strategy: FetchStrategy::Implicit,
            parents: Vec::new(),
            dependents: Vec::new(),
        }
    }

    /// Whether this is `model` or `view`.
    pub fn is_implicit(&self) -> bool {
        matches!(self.strategy, FetchStrategy::Implicit)
    }

    /// Whether the alias has no parent edge.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Distinct dependent aliases, in edge order.
    pub fn dependent_aliases(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for edge in &self.dependents {
            if !seen.contains(&edge.dependent.as_str()) {
                seen.push(edge.dependent.as_str());
            }
        }
        seen
    }
}

/// Parsed alias specs for one owner, in declaration order after `model` and `view`.
#[derive(Debug, Clone, Default)]
pub struct ParsedAliases {
    specs: Vec<AliasSpec>,
    index: HashMap<String, usize>,
    graph: DependencyGraph,
}

impl ParsedAliases {
    /// Spec for `alias`.
    pub fn get(&self, alias: &str) -> Option<&AliasSpec> {
        self.index.get(alias).map(|&i| &self.specs[i])
    }

    /// Whether `alias` is known, including `model` and `view`.
    pub fn contains(&self, alias: &str) -> bool {
        self.index.contains_key(alias)
    }

    /// All specs, implicit ones first.
    pub fn iter(&self) -> impl Iterator<Item = &AliasSpec> {
        self.specs.iter()
    }

    /// Declared specs only.
    pub fn declared(&self) -> impl Iterator<Item = &AliasSpec> {
        self.specs.iter().filter(|spec| !spec.is_implicit())
    }

    /// Declared aliases with no parent edge, in declaration order.
    pub fn roots(&self) -> Vec<&str> {
        self.declared().filter(|spec| spec.is_root()).map(|spec| spec.alias.as_str()).collect()
    }

    /// The alias dependency graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Number of specs, including `model` and `view`.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Always false; `model` and `view` are always present.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Validate `models` and build the alias specs.
///
/// # Errors
///
/// Returns [`DataError::InvalidDataModels`] with every problem found.
pub fn parse_data_models(models: &[DataModel], registry: &CacheRegistry) -> DataResult<ParsedAliases> {
    let mut problems = Vec::new();
    let mut specs: Vec<AliasSpec> = RESERVED_ALIASES.iter().map(|a| AliasSpec::implicit(a)).collect();
    let mut index: HashMap<String, usize> =
        specs.iter().enumerate().map(|(i, spec)| (spec.alias.clone(), i)).collect();
    let mut pending_edges: Vec<Edge> = Vec::new();

    for (position, model) in models.iter().enumerate() {
        let Some(alias) = model.alias.as_deref().filter(|a| !a.is_empty()) else {
            problems.push(ConfigProblem::MissingAlias {
                index: position,
            });
            continue;
        };

        if index.contains_key(alias) {
            problems.push(ConfigProblem::DuplicateAlias {
                alias: alias.to_string(),
            });
            continue;
        }

        let is_collection = model.model_type.is_none() && model.collection_type.is_some();
        let entity_type = model.entity_type().map(str::to_string);
        match &entity_type {
            None if model.fetcher.is_none() => problems.push(ConfigProblem::MissingType {
                alias: alias.to_string(),
            }),
            Some(entity_type) if !registry.contains(entity_type) => {
                problems.push(ConfigProblem::UnknownEntityType {
                    alias: alias.to_string(),
                    entity_type: entity_type.clone(),
                    suggestion: registry.closest_match(entity_type),
                })
            }
            _ => {}
        }

        let mut is_criteria = false;
        let mut edges = Vec::new();
        let id_source = if let Some(source) = model.id.as_ref().or(model.ids.as_ref()) {
            IdSource::Value(source.clone())
        } else if let Some(reference) = &model.id_property {
            match split_reference(reference) {
                Some((parent, property)) => {
                    edges.push(Edge {
                        parent: parent.to_string(),
                        dependent: alias.to_string(),
                        property: property.to_string(),
                    });
                    IdSource::Property {
                        parent: parent.to_string(),
                        property: property.to_string(),
                    }
                }
                None => {
                    problems.push(ConfigProblem::InvalidIdProperty {
                        alias: alias.to_string(),
                        value: reference.clone(),
                    });
                    IdSource::None
                }
            }
        } else if let Some(criteria) = &model.criteria {
            is_criteria = true;
            IdSource::Value(criteria.clone())
        } else if model.fetcher.is_some() {
            IdSource::Always
        } else {
            IdSource::None
        };

        for dependency in &model.dependencies {
            match split_reference(dependency) {
                Some((parent, property)) => edges.push(Edge {
                    parent: parent.to_string(),
                    dependent: alias.to_string(),
                    property: property.to_string(),
                }),
                None => problems.push(ConfigProblem::InvalidDependency {
                    alias: alias.to_string(),
                    value: dependency.clone(),
                }),
            }
        }
        let mut parents: Vec<Edge> = Vec::new();
        for edge in edges {
            if !parents.contains(&edge) {
                parents.push(edge);
            }
        }

        let strategy = match (&model.fetcher, is_criteria, is_collection) {
            (Some(fetcher), _, _) => FetchStrategy::Custom(fetcher.clone()),
            (None, true, true) => FetchStrategy::ByCriteria,
            (None, true, false) => FetchStrategy::ByCriteriaSingle,
            (None, false, true) => FetchStrategy::ByIds,
            (None, false, false) => FetchStrategy::ById,
        };

        let retrieval_mode = if model.use_pull {
            RetrievalMode::PullMissingOnly
        } else {
            RetrievalMode::AlwaysFetch
        };

        tracing::trace!(alias, strategy = strategy.name(), "alias parsed");
        pending_edges.extend(parents.iter().cloned());
        index.insert(alias.to_string(), specs.len());
        specs.push(AliasSpec {
            alias: alias.to_string(),
            entity_type,
            is_collection,
            is_criteria,
            retrieval_mode,
            id_source,
            strategy,
            parents,
            dependents: Vec::new(),
        });
    }

    let known: Vec<String> = specs.iter().map(|spec| spec.alias.clone()).collect();
    let mut graph = DependencyGraph::new();
    for spec in &specs {
        graph.ensure_node(&spec.alias);
    }
    for edge in &pending_edges {
        if !index.contains_key(&edge.parent) {
            let problem = ConfigProblem::UnknownParent {
                alias: edge.dependent.clone(),
                parent: edge.parent.clone(),
                suggestion: closest_match(&edge.parent, &known),
            };
            if !problems.contains(&problem) {
                problems.push(problem);
            }
            continue;
        }
        graph.add_dependency(&edge.parent, &edge.dependent, &edge.property);
        if let Some(&parent) = index.get(&edge.parent) {
            specs[parent].dependents.push(edge.clone());
        }
    }

    if let Some(chain) = graph.detect_cycles() {
        problems.push(ConfigProblem::CircularDependency {
            chain,
        });
    }

    if !problems.is_empty() {
        tracing::debug!(count = problems.len(), "data model validation failed");
        return Err(DataError::InvalidDataModels {
            problems,
        });
    }

    Ok(ParsedAliases {
        specs,
        index,
        graph,
    })
}
