//! Reasoning engine implementations.

pub mod anthropic;
pub mod keyword;
pub mod stub;

pub use anthropic::{AnthropicEngine, AnthropicEngineConfig};
pub use keyword::KeywordEngine;
pub use stub::StubReasoningEngine;

use std::sync::Arc;

use crate::domain::errors::EngineError;
use crate::domain::models::{EngineConfig, EngineKind};
use crate::domain::ports::ReasoningEngine;

/// Engine selected by configuration.
pub fn from_config(config: &EngineConfig) -> Result<Arc<dyn ReasoningEngine>, EngineError> {
    Ok(match config.kind {
        EngineKind::Keyword => Arc::new(KeywordEngine::new()),
        EngineKind::Anthropic => Arc::new(AnthropicEngine::new(AnthropicEngineConfig::from(config))?),
    })
}
