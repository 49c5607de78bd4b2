//! Investigation services: parsing, selection, scheduling and synthesis.

pub mod catalog;
pub mod evidence_store;
pub mod intent_parser;
pub mod investigator;
pub mod normalizer;
pub mod scheduler;
pub mod selection_policy;
pub mod synthesizer;
pub mod termination;

pub use catalog::{BuiltinTool, CatalogEntry, ToolCatalog, ToolCatalogBuilder};
pub use evidence_store::EvidenceStore;
pub use intent_parser::QueryIntentParser;
pub use investigator::{Investigator, InvestigatorSettings};
pub use normalizer::{EvidenceNormalizer, Normalized};
pub use scheduler::{ExecutionScheduler, SchedulerEvent, SchedulerOutcome};
pub use selection_policy::ToolSelectionPolicy;
pub use synthesizer::{Synthesis, Synthesizer};
pub use termination::TerminationPolicy;
