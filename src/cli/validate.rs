//! `irrigation validate`: check a file of data model declarations.
//!
//! The file is TOML with one `[[data_models]]` table per declaration:
//!
//! ```toml
//! [[data_models]]
//! alias = "plot"
//! modelType = "moisture"
//! idProperty = "view:plotId"
//!
//! [[data_models]]
//! alias = "latest"
//! collectionType = "moisture"
//! criteria = { pagination = { page = 1, pageSize = 5 } }
//! dependencies = ["view:refresh"]
//! ```
//!
//! Declarations are parsed against a registry that knows the `moisture` entity
//! type. Every problem is reported, not just the first.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::cache::CacheRegistry;
use crate::config::{DataModelFile, parse_config};
use crate::constants::{MODEL_ALIAS, MOISTURE_TYPE, VIEW_ALIAS};
use crate::moisture::MoistureBackend;
use crate::resolver::{ParsedAliases, parse_data_models};

/// Output format for validation results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with a dependency tree
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

/// Validate data model declarations.
#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// TOML file with `[[data_models]]` declarations
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output format: text or json
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Validation outcome, used for JSON output.
#[derive(Debug, Default, Serialize)]
pub struct ValidationResults {
    /// True when the declarations parsed without problems.
    pub valid: bool,
    /// Declared aliases, in declaration order.
    pub aliases: Vec<String>,
    /// Declared aliases fetched unconditionally at startup.
    pub roots: Vec<String>,
    /// Every problem found.
    pub errors: Vec<String>,
}

impl ValidateCommand {
    /// Run the command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the declarations are invalid.
    pub fn execute(self) -> Result<()> {
        let file: DataModelFile = match parse_config(&self.file) {
            Ok(file) => file,
            Err(e) => {
                self.report_failure(&[format!("{e:#}")])?;
                return Err(e);
            }
        };

        let registry = CacheRegistry::new();
        registry.register(MOISTURE_TYPE, MoistureBackend::new());

        match parse_data_models(&file.data_models, &registry) {
            Ok(parsed) => self.report_success(&parsed),
            Err(e) => {
                let errors: Vec<String> = match e.problems() {
                    [] => vec![e.to_string()],
                    problems => problems.iter().map(ToString::to_string).collect(),
                };
                self.report_failure(&errors)?;
                Err(e.into())
            }
        }
    }

    fn report_success(&self, parsed: &ParsedAliases) -> Result<()> {
        let results = ValidationResults {
            valid: true,
            aliases: parsed.declared().map(|spec| spec.alias.clone()).collect(),
            roots: parsed.roots().into_iter().map(str::to_string).collect(),
            errors: Vec::new(),
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
            OutputFormat::Text => {
                println!(
                    "{} {} is valid ({} aliases)",
                    "✓".green(),
                    self.file.display(),
                    results.aliases.len()
                );
                let graph = parsed.graph();
                for root in [MODEL_ALIAS, VIEW_ALIAS] {
                    if !graph.dependents_of(root).is_empty() {
                        print!("{}", graph.to_tree_string(root));
                    }
                }
                for root in &results.roots {
                    print!("{}", graph.to_tree_string(root));
                }
            }
        }
        Ok(())
    }

    fn report_failure(&self, errors: &[String]) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let results = ValidationResults {
                    errors: errors.to_vec(),
                    ..Default::default()
                };
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
            OutputFormat::Text => {
                println!("{} {} is invalid", "✗".red(), self.file.display());
                for error in errors {
                    println!("  - {error}");
                }
            }
        }
        Ok(())
    }
}
