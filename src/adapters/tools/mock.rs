//! Mock tool for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::ToolError;
use crate::domain::models::CanonicalArgs;
use crate::domain::ports::ToolExecutor;

/// Canned responses keyed by canonical arguments, with a default.
pub struct MockTool {
    default_response: Result<Value, ToolError>,
    response_overrides: HashMap<String, Result<Value, ToolError>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockTool {
    /// Returns `payload` for every call.
    pub fn returning(payload: Value) -> Self {
        Self::with_default_response(Ok(payload))
    }

    /// Fails every call with `error`.
    pub fn failing(error: ToolError) -> Self {
        Self::with_default_response(Err(error))
    }

    fn with_default_response(response: Result<Value, ToolError>) -> Self {
        Self {
            default_response: response,
            response_overrides: HashMap::new(),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Respond differently for one exact argument set.
    #[must_use]
    pub fn with_response_for(
        mut self,
        args: &CanonicalArgs,
        response: Result<Value, ToolError>,
    ) -> Self {
        self.response_overrides
            .insert(args.canonical_string(), response);
        self
    }

    /// Sleep before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared handle on the call counter, usable after the tool is boxed.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolExecutor for MockTool {
    async fn execute(&self, args: &CanonicalArgs) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response_overrides
            .get(&args.canonical_string())
            .unwrap_or(&self.default_response)
            .clone()
    }
}
