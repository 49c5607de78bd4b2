//! File-backed tool that replays recorded payloads.
//!
//! Each tool reads `<dir>/<tool>.json`. The file is either the payload itself,
//! an object with an `error` (a serialized [`ToolError`]), or a table of
//! `responses` matched against the call arguments:
//!
//! ```json
//! {
//!   "responses": [
//!     { "match": { "device_id": "d1" }, "payload": { "online": false } },
//!     { "match": { "device_id": "d2" }, "error": { "kind": "not_found", "message": "no device" } }
//!   ],
//!   "default": { "payload": {} }
//! }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::errors::ToolError;
use crate::domain::models::CanonicalArgs;
use crate::domain::ports::ToolExecutor;

#[derive(Debug, Deserialize)]
struct FixtureResponse {
    #[serde(default, rename = "match")]
    matcher: Map<String, Value>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    error: Option<ToolError>,
}

impl FixtureResponse {
    fn matches(&self, args: &CanonicalArgs) -> bool {
        self.matcher
            .iter()
            .all(|(name, expected)| args.get(name) == Some(expected))
    }

    fn into_result(self) -> Result<Value, ToolError> {
        match (self.error, self.payload) {
            (Some(error), _) => Err(error),
            (None, payload) => Ok(payload.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponseTable {
    responses: Vec<FixtureResponse>,
    #[serde(default)]
    default: Option<FixtureResponse>,
}

/// Replays `<dir>/<tool>.json` as a tool response.
pub struct FixtureTool {
    name: String,
    path: PathBuf,
}

impl FixtureTool {
    /// Tool `name` served from `dir`.
    pub fn new(dir: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = dir.as_ref().join(format!("{name}.json"));
        Self { name, path }
    }

    /// Fixture file backing this tool.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, document: Value, args: &CanonicalArgs) -> Result<Value, ToolError> {
        if document.get("responses").is_some() {
            let table: ResponseTable = serde_json::from_value(document).map_err(|e| {
                ToolError::upstream(format!("invalid fixture table for {}: {e}", self.name))
            })?;
            return table
                .responses
                .into_iter()
                .find(|r| r.matches(args))
                .or(table.default)
                .ok_or_else(|| {
                    ToolError::not_found(format!(
                        "no fixture response for {} with {}",
                        self.name,
                        args.canonical_string()
                    ))
                })?
                .into_result();
        }

        if let Some(error) = document.get("error") {
            let error: ToolError = serde_json::from_value(error.clone()).map_err(|e| {
                ToolError::upstream(format!("invalid fixture error for {}: {e}", self.name))
            })?;
            return Err(error);
        }

        Ok(document)
    }
}

#[async_trait]
impl ToolExecutor for FixtureTool {
    async fn execute(&self, args: &CanonicalArgs) -> Result<Value, ToolError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::not_found(format!(
                    "no fixture at {}",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(ToolError::upstream(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        debug!(tool = %self.name, path = %self.path.display(), "replaying fixture");

        let document: Value = serde_json::from_str(&raw).map_err(|e| {
            ToolError::upstream(format!("invalid JSON in {}: {e}", self.path.display()))
        })?;
        self.resolve(document, args)
    }
}
