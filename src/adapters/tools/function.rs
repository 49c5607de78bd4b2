//! Closure-backed tool for embedding callers and tests.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::domain::errors::ToolError;
use crate::domain::models::CanonicalArgs;
use crate::domain::ports::ToolExecutor;

type ToolFn = dyn Fn(CanonicalArgs) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync;

/// Wraps an async closure as a [`ToolExecutor`].
pub struct FnTool {
    f: Box<ToolFn>,
}

impl FnTool {
    /// Wraps `f`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(CanonicalArgs) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl ToolExecutor for FnTool {
    async fn execute(&self, args: &CanonicalArgs) -> Result<Value, ToolError> {
        (self.f)(args.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_closure_sees_arguments() {
        let tool = FnTool::new(|args: CanonicalArgs| {
            async move {
                match args.get_str("device_id") {
                    Some(id) => Ok(json!({"device_id": id})),
                    None => Err(ToolError::invalid_args("device_id is required")),
                }
            }
            .boxed()
        });

        let ok = tool
            .execute(&CanonicalArgs::new().with("device_id", "d1"))
            .await
            .unwrap();
        assert_eq!(ok["device_id"], "d1");
        assert!(tool.execute(&CanonicalArgs::new()).await.is_err());
    }
}
