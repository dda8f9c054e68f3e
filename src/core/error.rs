//! Error handling for the irrigation data service
//!
//! This module provides the error types used across the crate and the user-facing
//! error reporting used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** ([`DataError`]) for precise handling in code
//! 2. **User-friendly messages** ([`ErrorContext`]) with actionable suggestions
//!
//! # Error Categories
//!
//! - **Configuration**: [`DataError::InvalidDataModels`] aggregates every
//!   [`ConfigProblem`] found while parsing an owner's data models. It is fatal to
//!   initialization.
//! - **Cardinality**: [`DataError::Cardinality`] when a single-entity fetch resolves
//!   to zero or several entities.
//! - **Fetch invocation**: [`DataError::InvalidInput`], [`DataError::UnknownEntityType`],
//!   [`DataError::Transport`] and [`DataError::Fetcher`]. These are caught by the
//!   orchestrator and re-emitted as `fetchError:<alias>` notifications.
//! - **Lifecycle**: [`DataError::UnknownAlias`], [`DataError::Disposed`].
//!
//! Absent input (an empty id or criteria) is not an error; it clears the alias.
//!
//! # Examples
//!
//! ```rust,ignore
//! use irrigation_cli::core::{DataError, user_friendly_error};
//!
//! let err = DataError::UnknownAlias { alias: "moisture".into() };
//! user_friendly_error(anyhow::Error::from(err)).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// A single problem found while parsing data model declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    /// A declaration without an `alias`.
    MissingAlias {
        /// Position of the declaration in the list.
        index: usize,
    },
    /// Two declarations share the same alias.
    DuplicateAlias {
        /// The repeated alias.
        alias: String,
    },
    /// Neither `modelType`, `collectionType` nor a fetcher was given.
    MissingType {
        /// Alias of the declaration.
        alias: String,
    },
    /// The entity type is not registered with any master cache.
    UnknownEntityType {
        /// Alias of the declaration.
        alias: String,
        /// The unregistered type name.
        entity_type: String,
        /// Closest registered type name, if any is similar.
        suggestion: Option<String>,
    },
    /// An `idProperty` that is not of the form `alias:property`.
    InvalidIdProperty {
        /// Alias of the declaration.
        alias: String,
        /// The malformed value.
        value: String,
    },
    /// A `dependencies` entry that is not of the form `alias:property`.
    InvalidDependency {
        /// Alias of the declaration.
        alias: String,
        /// The malformed entry.
        value: String,
    },
    /// A dependency or `idProperty` names an alias that does not exist.
    UnknownParent {
        /// Alias of the declaration.
        alias: String,
        /// The unknown parent alias.
        parent: String,
        /// Closest declared alias, if any is similar.
        suggestion: Option<String>,
    },
    /// The dependency edges form a cycle.
    CircularDependency {
        /// Aliases on the cycle, first alias repeated at the end.
        chain: Vec<String>,
    },
}

impl ConfigProblem {
    /// Alias this problem is about, if it concerns a single declaration.
    pub fn alias(&self) -> Option<&str> {
        match self {
            ConfigProblem::MissingAlias { .. } | ConfigProblem::CircularDependency { .. } => None,
            ConfigProblem::DuplicateAlias { alias }
            | ConfigProblem::MissingType { alias }
            | ConfigProblem::UnknownEntityType { alias, .. }
            | ConfigProblem::InvalidIdProperty { alias, .. }
            | ConfigProblem::InvalidDependency { alias, .. }
            | ConfigProblem::UnknownParent { alias, .. } => Some(alias),
        }
    }
}

impl fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigProblem::MissingAlias { index } => {
                write!(f, "\"alias\" must be defined for all dataModels (entry {index})")
            }
            ConfigProblem::DuplicateAlias { alias } => {
                write!(f, "alias \"{alias}\" is declared more than once")
            }
            ConfigProblem::MissingType { alias } => write!(
                f,
                "\"modelType\" or \"collectionType\" was not defined for dataModel \"{alias}\""
            ),
            ConfigProblem::UnknownEntityType {
                alias,
                entity_type,
                suggestion,
            } => {
                write!(f, "invalid modelType or collectionType \"{entity_type}\" for dataModel \"{alias}\"")?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean \"{suggestion}\"?)")?;
                }
                Ok(())
            }
            ConfigProblem::InvalidIdProperty { alias, value } => {
                write!(f, "invalid idProperty \"{value}\" on dataModel \"{alias}\"")
            }
            ConfigProblem::InvalidDependency { alias, value } => {
                write!(f, "invalid dependency \"{value}\" on dataModel \"{alias}\"")
            }
            ConfigProblem::UnknownParent {
                alias,
                parent,
                suggestion,
            } => {
                write!(f, "dataModel \"{alias}\" depends on unknown alias \"{parent}\"")?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean \"{suggestion}\"?)")?;
                }
                Ok(())
            }
            ConfigProblem::CircularDependency { chain } => {
                write!(f, "circular dependency detected: {}", chain.join(" → "))
            }
        }
    }
}

/// The main error type for data service operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// One or more data model declarations are invalid.
    #[error("Error parsing data models:\n  {}", format_problems(.problems))]
    InvalidDataModels {
        /// Every problem found, in declaration order.
        problems: Vec<ConfigProblem>,
    },

    /// A single-entity fetch resolved to the wrong number of entities.
    #[error("Error fetching {alias} with {input}: Expected 1 result, found {found}")]
    Cardinality {
        /// Alias being fetched.
        alias: String,
        /// Description of the id or criteria used.
        input: String,
        /// Number of entities actually returned.
        found: usize,
    },

    /// The id or criteria value has the wrong shape for the fetch strategy.
    #[error("Invalid fetch input for {alias}: {reason}")]
    InvalidInput {
        /// Alias being fetched.
        alias: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// No master cache is registered for an entity type.
    #[error("No model found by name: {entity_type}")]
    UnknownEntityType {
        /// The unregistered type name.
        entity_type: String,
    },

    /// An accessor was called with an alias the owner never declared.
    #[error("Unknown alias: {alias}")]
    UnknownAlias {
        /// The undeclared alias.
        alias: String,
    },

    /// The transport for an entity type failed.
    #[error("Transport error for {entity_type}: {message}")]
    Transport {
        /// Entity type whose transport failed.
        entity_type: String,
        /// Transport failure description.
        message: String,
    },

    /// A custom fetcher reported a failure.
    #[error("Fetcher for {alias} failed: {message}")]
    Fetcher {
        /// Alias whose fetcher failed.
        alias: String,
        /// Failure description.
        message: String,
    },

    /// Criteria were rejected by the backend.
    #[error("Invalid criteria: {reason}")]
    InvalidCriteria {
        /// Why the criteria were rejected.
        reason: String,
    },

    /// The service was used after `dispose()`.
    #[error("Data service has been disposed")]
    Disposed,

    /// Configuration file problems.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error.
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Generic error message.
        message: String,
    },
}

fn format_problems(problems: &[ConfigProblem]) -> String {
    problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n  ")
}

impl DataError {
    /// Problems carried by an aggregate configuration error.
    pub fn problems(&self) -> &[ConfigProblem] {
        match self {
            DataError::InvalidDataModels { problems } => problems,
            _ => &[],
        }
    }
}

/// Result alias for data service operations.
pub type DataResult<T> = std::result::Result<T, DataError>;

/// Error wrapper with user-facing details and a suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error.
    pub error: DataError,
    /// Optional suggestion for resolving the error.
    pub suggestion: Option<String>,
    /// Optional additional details about the error.
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no suggestion or details.
    #[must_use]
    pub const fn new(error: DataError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions where known.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(data_error) = error.downcast_ref::<DataError>() {
        return create_error_context(data_error.clone());
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(DataError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax. Verify quotes, brackets, and key names")
        .with_details("Data model files use camelCase keys such as collectionType and idProperty");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(DataError::Other {
        message,
    })
}

fn create_error_context(error: DataError) -> ErrorContext {
    match &error {
        DataError::InvalidDataModels { problems } => {
            let cyclic =
                problems.iter().any(|p| matches!(p, ConfigProblem::CircularDependency { .. }));
            let context = ErrorContext::new(error.clone())
                .with_details(format!("{} problem(s) found; the owner was not initialized", problems.len()));
            if cyclic {
                context.with_suggestion(
                    "Break the cycle by removing one of the idProperty or dependencies entries on the chain",
                )
            } else {
                context.with_suggestion(
                    "Every data model needs an alias and one of modelType, collectionType or fetcher; references use the form alias:property",
                )
            }
        }
        DataError::UnknownEntityType { .. } => ErrorContext::new(error)
            .with_suggestion("Register a master cache for this entity type before creating owners"),
        DataError::Cardinality { .. } => ErrorContext::new(error)
            .with_details("Single-entity aliases must resolve to exactly one entity"),
        DataError::Transport { .. } => ErrorContext::new(error)
            .with_suggestion("Check that the backend for this entity type is reachable"),
        DataError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Check the settings file passed with --config or $IRRIGATION_CONFIG"),
        _ => ErrorContext::new(error),
    }
}
