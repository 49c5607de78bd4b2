//! Investigator - budget-bounded tool orchestration for support investigations
//!
//! Takes a free-text support question, classifies it, runs data-gathering
//! tools in bounded concurrent rounds, and synthesizes a timeline plus a
//! root-cause hypothesis with a confidence score.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the port traits
//! - **Service Layer** (`services`): Parsing, selection, scheduling and synthesis
//! - **Adapters** (`adapters`): Tool executors and reasoning engines
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use investigator::adapters::{engines::KeywordEngine, tools::builtin_catalog};
//! use investigator::{Budget, Investigator, InvestigatorSettings, ToolsConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let catalog = Arc::new(builtin_catalog(&ToolsConfig::default())?);
//!     let investigator = Investigator::new(
//!         catalog,
//!         Arc::new(KeywordEngine::new()),
//!         InvestigatorSettings::default(),
//!     );
//!     let result = investigator
//!         .investigate("device_123 keeps going offline", &Budget::standard())
//!         .await?;
//!     println!("{} ({:.2})", result.hypothesis.root_cause, result.confidence);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainResult, InvestigationError, ToolError, ToolErrorKind};
pub use domain::models::{
    Budget, BudgetProfile, Config, Hypothesis, Intent, InvestigationResult, IssueCategory,
    ResultFlag, RootCause, SchedulerState, TimelineEntry, ToolSpec, ToolsConfig,
};
pub use domain::ports::{ReasoningEngine, ToolExecutor};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Investigator, InvestigatorSettings, ToolCatalog};
