//! Common test utilities for integration tests
//!
//! Provides shared catalogs, engines and fixtures used across
//! multiple integration test files.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use investigator::adapters::engines::StubReasoningEngine;
use investigator::adapters::tools::MockTool;
use investigator::domain::ports::EngineIntent;
use investigator::services::{BuiltinTool, ToolCatalog};
use investigator::{Investigator, InvestigatorSettings, ToolSpec};
use serde_json::Value;

pub const DEVICE_ID: &str = "d1";
pub const WORKSPACE_ID: &str = "w1";

/// Engine that classifies every query into `category` with the test entities.
pub fn engine_for(category: &str) -> StubReasoningEngine {
    let mut entities = BTreeMap::new();
    entities.insert("device_id".to_string(), vec![DEVICE_ID.to_string()]);
    entities.insert("workspace_id".to_string(), vec![WORKSPACE_ID.to_string()]);
    StubReasoningEngine::new().with_intent(EngineIntent {
        category: category.to_string(),
        entities,
        confidence: 0.9,
        ..Default::default()
    })
}

/// Catalog holding only the listed builtin tools, each backed by a mock.
pub fn builtin_with(tools: Vec<(BuiltinTool, MockTool)>) -> ToolCatalog {
    tools
        .into_iter()
        .fold(ToolCatalog::builder(), |builder, (tool, mock)| {
            builder.register(tool.spec(10), Arc::new(mock))
        })
        .build()
        .expect("catalog should build")
}

/// Catalog of arbitrary specs, each backed by a mock.
pub fn catalog_of(tools: Vec<(ToolSpec, MockTool)>) -> ToolCatalog {
    tools
        .into_iter()
        .fold(ToolCatalog::builder(), |builder, (spec, mock)| {
            builder.register(spec, Arc::new(mock))
        })
        .build()
        .expect("catalog should build")
}

pub fn investigator_with(catalog: ToolCatalog, engine: StubReasoningEngine) -> Investigator {
    Investigator::new(
        Arc::new(catalog),
        Arc::new(engine),
        InvestigatorSettings::default(),
    )
}

/// Write `<dir>/<tool>.json` for the fixture tools.
pub fn write_fixture(dir: &Path, tool: &str, payload: &Value) {
    let body = serde_json::to_string_pretty(payload).expect("fixture should serialize");
    std::fs::write(dir.join(format!("{tool}.json")), body).expect("fixture should be written");
}

/// Empty directory for fixture files, removed on drop.
pub fn temp_fixture_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}
