//! Reasoning engine backed by the Anthropic Messages API.
//!
//! The model is asked to answer with a single JSON object. The adapter only
//! transports and decodes; the parser and selection policy validate the
//! decoded reply like any other engine answer.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::EngineError;
use crate::domain::models::EngineConfig;
use crate::domain::ports::{EngineChoice, EngineContext, EngineIntent, ProposedTool, ReasoningEngine};

const PARSE_PROMPT: &str = "You classify customer support questions about smart locks and \
access control devices. Reply with one JSON object and nothing else, using these keys: \
question_type (one of device_behavior, troubleshooting, api_help, account_issue, unknown), \
device_ids, access_codes, workspace_ids, connected_account_ids, action_attempt_ids, \
time_references, device_types, operations (all arrays of strings, empty when absent), \
confidence (number between 0 and 1) and summary (one sentence). Copy identifiers exactly \
as written in the question.";

const PROPOSE_PROMPT: &str = "You help investigate a support issue by choosing which data \
tools to run next. You receive the interpreted question, findings so far, the tools already \
run and the candidate tools with their arguments. Reply with one JSON object and nothing \
else: {\"tools\": [{\"name\": \"<candidate tool>\", \"args\": {}}]}. Only name candidate \
tools, only pass declared arguments, and return an empty list when nothing more is useful.";

/// Connection settings for the Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicEngineConfig {
    /// API key (read from ANTHROPIC_API_KEY when not set).
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Value of the `anthropic-version` header.
    pub api_version: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
}

impl Default for AnthropicEngineConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for AnthropicEngineConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model: config.model.clone(),
            api_version: "2023-06-01".to_string(),
            timeout_secs: config.timeout_secs,
            max_tokens: config.max_tokens,
        }
    }
}

impl AnthropicEngineConfig {
    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// Intent as the model is asked to return it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireIntent {
    question_type: String,
    device_ids: Vec<String>,
    access_codes: Vec<String>,
    workspace_ids: Vec<String>,
    connected_account_ids: Vec<String>,
    action_attempt_ids: Vec<String>,
    time_references: Vec<String>,
    device_types: Vec<String>,
    operations: Vec<String>,
    confidence: f64,
    summary: String,
}

impl From<WireIntent> for EngineIntent {
    fn from(wire: WireIntent) -> Self {
        let entities: BTreeMap<String, Vec<String>> = [
            ("device_ids", wire.device_ids),
            ("access_codes", wire.access_codes),
            ("workspace_ids", wire.workspace_ids),
            ("connected_account_ids", wire.connected_account_ids),
            ("action_attempt_ids", wire.action_attempt_ids),
        ]
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(field, values)| (field.to_string(), values))
        .collect();

        Self {
            category: wire.question_type,
            entities,
            time_references: wire.time_references,
            device_brands: wire.device_types,
            operations: wire.operations,
            confidence: wire.confidence,
            summary: wire.summary,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireProposals {
    #[serde(default)]
    tools: Vec<ProposedTool>,
}

/// Reasoning engine backed by the Anthropic Messages API.
pub struct AnthropicEngine {
    config: AnthropicEngineConfig,
    client: Client,
}

impl AnthropicEngine {
    /// Builds the HTTP client.
    pub fn new(config: AnthropicEngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Unavailable(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, EngineError> {
        let api_key = self
            .config
            .get_api_key()
            .ok_or_else(|| EngineError::Unavailable("ANTHROPIC_API_KEY not set".to_string()))?;

        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout
                } else {
                    EngineError::Unavailable(format!("API request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Malformed(format!("Failed to parse response: {e}")))?;

        let text = body
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        debug!(chars = text.len(), "engine reply received");
        Ok(text)
    }
}

/// The outermost `{...}` span of a reply, ignoring any prose or code fences.
fn json_object(text: &str) -> Result<Value, EngineError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let slice = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => return Err(EngineError::Malformed("reply contains no JSON object".to_string())),
    };
    serde_json::from_str(slice).map_err(|e| EngineError::Malformed(e.to_string()))
}

#[async_trait]
impl ReasoningEngine for AnthropicEngine {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn propose(&self, context: &EngineContext) -> Result<EngineChoice, EngineError> {
        match context {
            EngineContext::ParseQuery { query } => {
                let reply = self.complete(PARSE_PROMPT, query.clone()).await?;
                let wire: WireIntent = serde_json::from_value(json_object(&reply)?)
                    .map_err(|e| EngineError::Malformed(e.to_string()))?;
                Ok(EngineChoice::Intent(wire.into()))
            }
            EngineContext::ProposeTools { .. } => {
                let user = serde_json::to_string_pretty(context)
                    .map_err(|e| EngineError::Malformed(e.to_string()))?;
                let reply = self.complete(PROPOSE_PROMPT, user).await?;
                let wire: WireProposals = serde_json::from_value(json_object(&reply)?)
                    .map_err(|e| EngineError::Malformed(e.to_string()))?;
                Ok(EngineChoice::Tools { tools: wire.tools })
            }
        }
    }
}
