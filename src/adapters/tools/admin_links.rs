//! Builds admin console links for the entities under investigation.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::errors::ToolError;
use crate::domain::models::CanonicalArgs;
use crate::domain::ports::ToolExecutor;

/// One admin console link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminLink {
    /// Short label.
    pub title: String,
    /// Absolute URL.
    pub url: String,
    /// What the page shows.
    pub description: String,
}

/// Builds admin console links for the ids it is given.
pub struct AdminLinksTool {
    base_url: String,
}

impl AdminLinksTool {
    /// Tool generating links under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Links for every id present in `args`.
    pub fn links(&self, args: &CanonicalArgs) -> Vec<AdminLink> {
        let base = &self.base_url;
        let mut links = Vec::new();

        if let Some(device) = args.get_str("device_id") {
            links.push(AdminLink {
                title: "Device".to_string(),
                url: format!("{base}/view_device?device_id={device}&quickwit=true"),
                description: "Device record, properties and recent events".to_string(),
            });
            links.push(AdminLink {
                title: "Action attempts".to_string(),
                url: format!("{base}/view_device_action_attempts?device_id={device}"),
                description: "Lock, unlock and access code actions on the device".to_string(),
            });
        }
        if let Some(code) = args.get_str("access_code_id") {
            links.push(AdminLink {
                title: "Access code".to_string(),
                url: format!("{base}/view_access_code?access_code_id={code}&quickwit=true"),
                description: "Access code state and sync history".to_string(),
            });
        }
        if let Some(workspace) = args.get_str("workspace_id") {
            links.push(AdminLink {
                title: "Workspace".to_string(),
                url: format!("{base}/view_workspace?workspace_id={workspace}"),
                description: "Workspace settings and connected accounts".to_string(),
            });
        }
        links
    }
}

#[async_trait]
impl ToolExecutor for AdminLinksTool {
    async fn execute(&self, args: &CanonicalArgs) -> Result<Value, ToolError> {
        let links = self.links(args);
        if links.is_empty() {
            return Err(ToolError::invalid_args(
                "admin links need a device, access code or workspace id",
            ));
        }
        Ok(json!({ "admin_links": links }))
    }
}
