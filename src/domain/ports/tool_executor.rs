//! Tool port - interface for evidence-gathering backends.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::ToolError;
use crate::domain::models::CanonicalArgs;

/// A side-effect-free data source invoked by the scheduler.
///
/// Implementations must not enforce their own caller timeout; the scheduler
/// wraps every call in one. Failures are returned as data, never panics.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute the tool with already-bound arguments.
    async fn execute(&self, args: &CanonicalArgs) -> Result<Value, ToolError>;
}
