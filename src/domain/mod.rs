//! Domain layer for the investigation orchestrator
//!
//! This module contains the core models, errors and the port traits that
//! adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    BudgetError, CatalogError, DomainResult, EngineError, InitError, InvestigationError,
    ToolError, ToolErrorKind,
};
