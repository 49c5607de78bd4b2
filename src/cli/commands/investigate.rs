//! Investigate command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::{engines, tools};
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{
    BudgetProfile, Config, EvidenceItem, InvestigationResult, ResultFlag,
};
use crate::services::{Investigator, InvestigatorSettings};

/// Investigate a support question
#[derive(Args, Debug)]
pub struct InvestigateArgs {
    /// Support question to investigate ("-" reads it from stdin)
    pub query: String,

    /// Budget profile (standard, production, debug)
    #[arg(short, long)]
    pub profile: Option<BudgetProfile>,

    /// Override the maximum number of rounds
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Override the total tool call budget
    #[arg(long)]
    pub max_calls: Option<usize>,

    /// Override the investigation deadline in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Directory of recorded tool responses
    #[arg(short, long, value_name = "DIR")]
    pub fixtures: Option<PathBuf>,
}

impl InvestigateArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(profile) = self.profile {
            config.budget.profile = profile;
        }
        if let Some(rounds) = self.max_rounds {
            config.budget.max_rounds = Some(rounds);
        }
        if let Some(calls) = self.max_calls {
            config.budget.max_total_tool_calls = Some(calls);
        }
        if let Some(secs) = self.deadline_secs {
            config.budget.deadline_secs = Some(secs);
        }
        if let Some(ref dir) = self.fixtures {
            config.tools.fixtures_dir = Some(dir.display().to_string());
        }
    }

    fn query_text(&self) -> Result<String> {
        if self.query == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read query from stdin")?;
            Ok(buf.trim().to_string())
        } else {
            Ok(self.query.clone())
        }
    }
}

/// Result of `investigate`.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct InvestigationOutput {
    /// The investigation result.
    pub result: InvestigationResult,
}

impl CommandOutput for InvestigationOutput {
    fn to_human(&self) -> String {
        let r = &self.result;
        let mut out = String::new();

        let _ = writeln!(out, "Investigation {}", r.investigation_id);
        let _ = writeln!(
            out,
            "Category: {} (intent confidence {:.2}{})",
            r.intent.category,
            r.intent.confidence,
            if r.intent.ambiguous { ", ambiguous" } else { "" }
        );
        let _ = writeln!(
            out,
            "Root cause: {} (confidence {:.2})",
            r.hypothesis.root_cause, r.confidence
        );
        let _ = writeln!(out, "  {}", r.hypothesis.summary);
        let _ = writeln!(
            out,
            "Rounds: {} | Tool calls: {} | Cache hits: {} | State: {} | {} ms",
            r.rounds_completed, r.tool_calls_executed, r.cache_hits, r.final_state, r.elapsed_ms
        );
        for flag in &r.flags {
            let label = match flag {
                ResultFlag::Incomplete(reason) => format!("incomplete ({reason:?})"),
                ResultFlag::ParseAmbiguity => "parse ambiguity".to_string(),
                ResultFlag::ToolErrors => "tool errors".to_string(),
            };
            let _ = writeln!(out, "Warning: {label}");
        }

        if !r.key_findings.is_empty() {
            out.push_str("\nKey findings:\n");
            for finding in &r.key_findings {
                let _ = writeln!(out, "  - {finding}");
            }
        }

        if r.timeline.is_empty() {
            out.push_str("\nNo timeline evidence collected.\n");
        } else {
            let mut table = list_table(&["TIME", "SOURCE", "KIND", "DETAIL", "ALSO SEEN BY"]);
            for entry in &r.timeline {
                let item = &entry.item;
                table.add_row(vec![
                    item.timestamp
                        .map_or_else(|| "-".to_string(), |ts| ts.format("%Y-%m-%d %H:%M:%S").to_string()),
                    item.source.clone(),
                    item.kind.clone(),
                    truncate(&detail(item), 60),
                    entry.corroborated_by.join(", "),
                ]);
            }
            let _ = write!(out, "\nTimeline:\n{table}\n");
        }

        if !r.errors.is_empty() {
            let mut table = list_table(&["ROUND", "TOOL", "ERROR"]);
            for entry in &r.errors {
                table.add_row(vec![
                    entry.round.to_string(),
                    entry.tool.clone(),
                    truncate(&entry.error.to_string(), 70),
                ]);
            }
            let _ = write!(out, "\nErrors:\n{table}\n");
        }

        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn detail(item: &EvidenceItem) -> String {
    ["message", "event_type", "status", "error"]
        .iter()
        .find_map(|field| item.str_field(field))
        .map_or_else(|| item.payload.to_string(), ToString::to_string)
}

/// Runs one investigation and prints the result.
pub async fn execute(args: InvestigateArgs, mut config: Config, json_mode: bool) -> Result<()> {
    args.apply(&mut config);
    let query = args.query_text()?;
    let budget = config.budget.to_budget();

    let catalog = Arc::new(
        tools::builtin_catalog(&config.tools).context("Failed to build tool catalog")?,
    );
    let engine =
        engines::from_config(&config.engine).context("Failed to create reasoning engine")?;
    let investigator = Investigator::new(catalog, engine, InvestigatorSettings::from(&config));

    let result = investigator
        .investigate(&query, &budget)
        .await
        .context("Investigation failed")?;

    output(&InvestigationOutput { result }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IssueCategory;

    fn args(query: &str) -> InvestigateArgs {
        InvestigateArgs {
            query: query.to_string(),
            profile: None,
            max_rounds: None,
            max_calls: None,
            deadline_secs: None,
            fixtures: None,
        }
    }

    #[test]
    fn test_overrides_applied_to_config() {
        let mut config = Config::default();
        let args = InvestigateArgs {
            profile: Some(BudgetProfile::Debug),
            max_rounds: Some(2),
            fixtures: Some(PathBuf::from("/srv/fixtures")),
            ..args("lock offline")
        };
        args.apply(&mut config);

        let budget = config.budget.to_budget();
        assert_eq!(config.budget.profile, BudgetProfile::Debug);
        assert_eq!(budget.max_rounds, 2);
        assert_eq!(config.tools.fixtures_dir.as_deref(), Some("/srv/fixtures"));
    }

    #[tokio::test]
    async fn test_human_output_without_evidence() {
        let mut config = Config::default();
        config.budget.max_rounds = Some(0);
        let catalog = Arc::new(tools::builtin_catalog(&config.tools).unwrap());
        let engine = engines::from_config(&config.engine).unwrap();
        let investigator =
            Investigator::new(catalog, engine, InvestigatorSettings::from(&config));
        let result = investigator
            .investigate("front door lock keeps going offline", &config.budget.to_budget())
            .await
            .unwrap();
        assert_eq!(result.intent.category, IssueCategory::Troubleshooting);

        let rendered = InvestigationOutput { result }.to_human();
        assert!(rendered.contains("Root cause: unknown"));
        assert!(rendered.contains("No timeline evidence collected."));
        assert!(rendered.contains("Warning: incomplete"));
    }
}
