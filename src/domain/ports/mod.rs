//! Port trait definitions (Hexagonal Architecture)
//!
//! - ToolExecutor: evidence-gathering data sources
//! - ReasoningEngine: query interpretation and follow-up proposals
//!
//! Services depend only on these traits; adapters provide implementations.

pub mod reasoning_engine;
pub mod tool_executor;

pub use reasoning_engine::{EngineChoice, EngineContext, EngineIntent, ProposedTool, ReasoningEngine};
pub use tool_executor::ToolExecutor;
