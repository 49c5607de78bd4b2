//! Tools command: list the catalog an investigation would use.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::adapters::tools;
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, IssueCategory, ToolSpec};

/// List the tools available to investigations
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Only show tools that run first for this category
    #[arg(short = 'C', long)]
    pub category: Option<IssueCategory>,

    /// Directory of recorded tool responses
    #[arg(short, long, value_name = "DIR")]
    pub fixtures: Option<PathBuf>,
}

/// Result of `tools`.
#[derive(Debug, Serialize)]
pub struct ToolListOutput {
    /// Registered tools, in catalog order.
    pub tools: Vec<ToolSpec>,
}

impl CommandOutput for ToolListOutput {
    fn to_human(&self) -> String {
        if self.tools.is_empty() {
            return "No tools found.".to_string();
        }

        let mut table = list_table(&["NAME", "ROLE", "PRIORITY", "ARGS", "DESCRIPTION"]);
        for spec in &self.tools {
            let args = spec
                .args
                .iter()
                .map(|arg| {
                    if arg.required {
                        arg.name.clone()
                    } else {
                        format!("[{}]", arg.name)
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            table.add_row(vec![
                spec.name.clone(),
                serde_json::to_value(spec.role)
                    .ok()
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default(),
                spec.priority.to_string(),
                args,
                truncate(&spec.description, 50),
            ]);
        }
        format!("{table}\n\nShowing {} tool(s)", self.tools.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Lists the tools the catalog would register.
pub fn execute(args: &ToolsArgs, mut config: Config, json_mode: bool) -> Result<()> {
    if let Some(ref dir) = args.fixtures {
        config.tools.fixtures_dir = Some(dir.display().to_string());
    }
    let catalog = tools::builtin_catalog(&config.tools).context("Failed to build tool catalog")?;

    let tools: Vec<ToolSpec> = match args.category {
        Some(category) => catalog.for_category(category).cloned().collect(),
        None => catalog.specs().cloned().collect(),
    };

    output(&ToolListOutput { tools }, json_mode);
    Ok(())
}
