//! Query intent parsing.
//!
//! Regex extraction always runs and its entities survive engine failure.
//! Classification is delegated to the reasoning engine under a timeout; a
//! timeout or malformed reply yields an `unknown` intent with zero confidence.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::EngineError;
use crate::domain::models::evidence::parse_timestamp_str;
use crate::domain::models::{
    EntityKind, EntityMap, Intent, InvestigationQuery, IssueCategory, ParserConfig, TimeRange,
};
use crate::domain::ports::{EngineChoice, EngineContext, EngineIntent, ReasoningEngine};

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("uuid pattern compiles")
});

static PIN_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcode\s*[:#]?\s*(\d{4,8})\b").expect("pin pattern compiles")
});

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("timestamp pattern compiles")
});

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}:\d{2}(?:\s*[ap]\.?m\b)?").expect("clock pattern compiles")
});

static RELATIVE_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:yesterday|today|tonight|this (?:morning|afternoon|evening)|last (?:night|week))\b",
    )
    .expect("relative day pattern compiles")
});

static OPERATIONS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("unlock", r"(?i)\bunlock"),
        ("lock", r"(?i)\b(?:auto-?)?lock(?:ed|ing|s)?\b"),
        (
            "create_access_code",
            r"(?i)\b(?:creat|add|set)\w*\s+(?:an?\s+|the\s+)?(?:new\s+)?(?:access\s+)?codes?\b",
        ),
        (
            "delete_access_code",
            r"(?i)\b(?:delet|remov)\w*\s+(?:an?\s+|the\s+)?(?:access\s+)?codes?\b",
        ),
        ("sync", r"(?i)\bsync"),
        ("connect", r"(?i)\b(?:re)?connect(?:ed|ing|ion)?\b"),
    ]
    .into_iter()
    .map(|(op, pattern)| (op, Regex::new(pattern).expect("operation pattern compiles")))
    .collect()
});

const BRANDS: [&str; 16] = [
    "Nuki",
    "August",
    "Yale",
    "Schlage",
    "Kwikset",
    "SmartThings",
    "Igloohome",
    "Salto",
    "Lockly",
    "TTLock",
    "dormakaba",
    "4SUITES",
    "Wyze",
    "ecobee",
    "Minut",
    "NoiseAware",
];

static BRAND_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    BRANDS
        .into_iter()
        .map(|brand| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(brand));
            (brand, Regex::new(&pattern).expect("brand pattern compiles"))
        })
        .collect()
});

/// "August 3", "august 21st": the month, not the lock brand.
static MONTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^august\s+\d{1,2}(?:st|nd|rd|th)?\b").expect("month date pattern compiles")
});

/// Result of the regex pass over a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Identifiers, keyed by kind.
    pub entities: EntityMap,
    /// Raw time expressions.
    pub time_references: Vec<String>,
    /// Absolute timestamps that parsed.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Brands mentioned, as spelled in the brand list.
    pub device_brands: Vec<String>,
    /// Operations mentioned.
    pub operations: Vec<String>,
}

/// Best-effort regex extraction.
pub fn extract(text: &str) -> Extraction {
    let mut out = Extraction::default();

    for line in text.lines() {
        let mut label_start = 0;
        for m in UUID.find_iter(line) {
            let label = line[label_start..m.start()].to_lowercase();
            let kind = classify_label(&label);
            out.entities
                .entry(kind)
                .or_default()
                .insert(m.as_str().to_lowercase());
            label_start = m.end();
        }
    }

    for caps in PIN_CODE.captures_iter(text) {
        if let Some(code) = caps.get(1) {
            out.entities
                .entry(EntityKind::AccessCode)
                .or_default()
                .insert(code.as_str().to_string());
        }
    }

    for m in ISO_TIMESTAMP.find_iter(text) {
        push_unique(&mut out.time_references, m.as_str());
        if let Some(ts) = parse_timestamp_str(m.as_str()) {
            out.timestamps.push(ts);
        }
    }
    let scrubbed = ISO_TIMESTAMP.replace_all(text, " ");
    for m in CLOCK_TIME.find_iter(&scrubbed) {
        push_unique(&mut out.time_references, m.as_str().trim());
    }
    for m in RELATIVE_DAY.find_iter(text) {
        push_unique(&mut out.time_references, &m.as_str().to_lowercase());
    }

    for (brand, pattern) in BRAND_PATTERNS.iter() {
        if mentions_brand(pattern, text) {
            push_unique(&mut out.device_brands, brand);
        }
    }
    for (op, pattern) in OPERATIONS.iter() {
        if pattern.is_match(text) {
            push_unique(&mut out.operations, op);
        }
    }

    out
}

fn mentions_brand(pattern: &Regex, text: &str) -> bool {
    pattern
        .find_iter(text)
        .any(|m| !MONTH_DATE.is_match(&text[m.start()..]))
}

/// Entity kind for a UUID, judged by the text just before it on its line.
fn classify_label(label: &str) -> EntityKind {
    let has_brand = BRAND_PATTERNS.iter().any(|(_, pattern)| {
        pattern
            .find_iter(label)
            .any(|m| label[m.end()..].trim_start().starts_with("account"))
    });
    if label.contains("action attempt") {
        EntityKind::ActionAttemptId
    } else if label.contains("connected account") || has_brand {
        EntityKind::ConnectedAccountId
    } else if label.contains("workspace") {
        EntityKind::WorkspaceId
    } else if label.contains("access code") {
        EntityKind::AccessCodeId
    } else if label.contains("third party") || label.contains("third-party") {
        EntityKind::ThirdPartyDeviceId
    } else {
        EntityKind::DeviceId
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        values.push(value.to_string());
    }
}

/// Engine intent after validation.
#[derive(Debug, Clone, PartialEq)]
struct ValidatedIntent {
    category: IssueCategory,
    confidence: f64,
    entities: Vec<(EntityKind, String)>,
    raw: EngineIntent,
}

fn validate(raw: EngineIntent) -> Result<ValidatedIntent, EngineError> {
    let category = raw
        .category
        .parse::<IssueCategory>()
        .map_err(EngineError::Malformed)?;
    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(EngineError::Malformed(format!(
            "confidence out of range: {}",
            raw.confidence
        )));
    }
    let mut entities = Vec::new();
    for (field, values) in &raw.entities {
        let Some(kind) = EntityKind::from_field(field) else {
            debug!(field = %field, "ignoring unknown entity field from engine");
            continue;
        };
        for value in values {
            let value = value.trim();
            if !value.is_empty() {
                let value = if UUID.is_match(value) {
                    value.to_lowercase()
                } else {
                    value.to_string()
                };
                entities.push((kind, value));
            }
        }
    }
    Ok(ValidatedIntent {
        category,
        confidence: raw.confidence,
        entities,
        raw,
    })
}

/// Parses raw queries into [`Intent`]s.
pub struct QueryIntentParser {
    engine: Arc<dyn ReasoningEngine>,
    config: ParserConfig,
}

impl QueryIntentParser {
    /// Parser backed by `engine`.
    pub fn new(engine: Arc<dyn ReasoningEngine>, config: ParserConfig) -> Self {
        Self { engine, config }
    }

    /// Parse a query, waiting at most `limit` for the engine.
    pub async fn parse(&self, query: &InvestigationQuery, limit: Duration) -> Intent {
        let extraction = extract(&query.text);
        let wait = self.config.engine_timeout().min(limit);
        let context = EngineContext::ParseQuery {
            query: query.text.clone(),
        };

        let reply = match tokio::time::timeout(wait, self.engine.propose(&context)).await {
            Ok(Ok(EngineChoice::Intent(raw))) => validate(raw),
            Ok(Ok(EngineChoice::Tools { .. })) => Err(EngineError::Malformed(
                "expected an intent, got tool proposals".to_string(),
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(EngineError::Timeout),
        };

        let engine_intent = match reply {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(engine = self.engine.name(), error = %e, "intent engine failed, falling back to unknown");
                None
            }
        };

        let intent = self.merge(&query.text, extraction, engine_intent);
        debug!(
            category = %intent.category,
            confidence = intent.confidence,
            ambiguous = intent.ambiguous,
            entity_kinds = intent.entities.len(),
            "parsed query intent"
        );
        intent
    }

    fn merge(&self, text: &str, extraction: Extraction, engine: Option<ValidatedIntent>) -> Intent {
        let mut intent = Intent::unknown();
        intent.entities = extraction.entities;
        intent.time_range = TimeRange::covering(&extraction.timestamps);
        intent.time_references = extraction.time_references;
        intent.device_brands = extraction.device_brands;
        intent.operations = extraction.operations;
        intent.summary = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .chars()
            .take(160)
            .collect();

        if let Some(engine) = engine {
            intent.category = engine.category;
            intent.confidence = engine.confidence;
            for (kind, value) in engine.entities {
                intent.entities.entry(kind).or_default().insert(value);
            }
            for value in &engine.raw.time_references {
                push_unique(&mut intent.time_references, value.trim());
            }
            for value in &engine.raw.device_brands {
                push_unique(&mut intent.device_brands, value.trim());
            }
            for value in &engine.raw.operations {
                push_unique(&mut intent.operations, value.trim());
            }
            if !engine.raw.summary.trim().is_empty() {
                intent.summary = engine.raw.summary.trim().to_string();
            }
        }

        let conflicts = i32::try_from(intent.conflicting_kinds().len()).unwrap_or(i32::MAX);
        intent.confidence =
            (intent.confidence * self.config.ambiguity_penalty.powi(conflicts)).clamp(0.0, 1.0);

        if intent.confidence < self.config.ambiguity_threshold {
            intent.ambiguous = true;
            intent.category = IssueCategory::Unknown;
        }
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::engines::StubReasoningEngine;

    const NUKI_QUERY: &str = "Hello team,
Will Nuki devices auto-lock after a few minutes of being unlocked?
for reference: 1409 Gate/Puerta Calle
ID: 49aa8687-041e-471e-9188-8b0b13d930b3
Connected Account: 45a2cfbc-f8cd-412d-b9b1-2595835ca854
Unlocked at 12:02 pm
remained unlocked until 12:14 pm.";

    fn parser(engine: StubReasoningEngine) -> QueryIntentParser {
        QueryIntentParser::new(Arc::new(engine), ParserConfig::default())
    }

    #[test]
    fn test_extract_labels_uuids() {
        let extraction = extract(NUKI_QUERY);
        assert_eq!(
            extraction.entities[&EntityKind::DeviceId]
                .iter()
                .collect::<Vec<_>>(),
            vec!["49aa8687-041e-471e-9188-8b0b13d930b3"]
        );
        assert!(extraction.entities[&EntityKind::ConnectedAccountId]
            .contains("45a2cfbc-f8cd-412d-b9b1-2595835ca854"));
        assert_eq!(extraction.time_references, vec!["12:02 pm", "12:14 pm"]);
        assert_eq!(extraction.device_brands, vec!["Nuki"]);
        assert!(extraction.operations.contains(&"unlock".to_string()));
        assert!(extraction.operations.contains(&"lock".to_string()));
    }

    #[test]
    fn test_brands_match_whole_words_only() {
        let extraction = extract("The Yale lock went offline a few minutes after August 3rd");
        assert_eq!(extraction.device_brands, vec!["Yale"]);

        let extraction = extract("Their August lock and a Minut sensor stopped syncing");
        assert_eq!(extraction.device_brands, vec!["August", "Minut"]);
    }

    #[test]
    fn test_brand_account_label_requires_whole_word() {
        assert_eq!(
            classify_label("schlage account "),
            EntityKind::ConnectedAccountId
        );
        assert_eq!(classify_label("minutes account "), EntityKind::DeviceId);
    }

    #[test]
    fn test_extract_codes_and_timestamps() {
        let text = "Workspace: 11111111-2222-3333-4444-555555555555\n\
                    Access code 7788 stopped working at 2024-07-21T14:41:11Z, code: 9911";
        let extraction = extract(text);
        assert!(extraction.entities[&EntityKind::WorkspaceId]
            .contains("11111111-2222-3333-4444-555555555555"));
        let codes = &extraction.entities[&EntityKind::AccessCode];
        assert!(codes.contains("7788") && codes.contains("9911"));
        assert_eq!(extraction.timestamps.len(), 1);
        assert_eq!(extraction.time_references, vec!["2024-07-21T14:41:11Z"]);
    }

    #[tokio::test]
    async fn test_engine_failure_keeps_regex_entities() {
        let parser = parser(StubReasoningEngine::failing(EngineError::Unavailable(
            "down".into(),
        )));
        let intent = parser
            .parse(&InvestigationQuery::new(NUKI_QUERY), Duration::from_secs(5))
            .await;

        assert_eq!(intent.category, IssueCategory::Unknown);
        assert!(intent.confidence.abs() < f64::EPSILON);
        assert!(intent.ambiguous);
        assert!(intent.first(EntityKind::DeviceId).is_some());
    }

    #[tokio::test]
    async fn test_engine_timeout_returns_unknown() {
        let engine = StubReasoningEngine::new()
            .with_intent(EngineIntent {
                category: "troubleshooting".into(),
                confidence: 0.9,
                ..Default::default()
            })
            .with_delay(Duration::from_secs(5));
        let intent = parser(engine)
            .parse(&InvestigationQuery::new("lock offline"), Duration::from_millis(50))
            .await;
        assert_eq!(intent.category, IssueCategory::Unknown);
        assert!(intent.confidence.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_malformed_engine_reply_returns_unknown() {
        let engine = StubReasoningEngine::new().with_intent(EngineIntent {
            category: "billing_dispute".into(),
            confidence: 0.9,
            ..Default::default()
        });
        let intent = parser(engine)
            .parse(&InvestigationQuery::new("invoice wrong"), Duration::from_secs(1))
            .await;
        assert_eq!(intent.category, IssueCategory::Unknown);
        assert!(intent.confidence.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_conflicting_ids_lower_confidence() {
        let engine = StubReasoningEngine::new().with_intent(EngineIntent {
            category: "troubleshooting".into(),
            confidence: 0.9,
            ..Default::default()
        });
        let text = "device 11111111-1111-1111-1111-111111111111 or maybe \
                    device 22222222-2222-2222-2222-222222222222 is broken";
        let intent = parser(engine)
            .parse(&InvestigationQuery::new(text), Duration::from_secs(1))
            .await;

        assert_eq!(intent.values(EntityKind::DeviceId).count(), 2);
        assert!((intent.confidence - 0.72).abs() < 1e-9);
        assert_eq!(intent.category, IssueCategory::Troubleshooting);
        assert!(!intent.ambiguous);
    }

    #[tokio::test]
    async fn test_low_confidence_downgrades_to_unknown() {
        let engine = StubReasoningEngine::new().with_intent(EngineIntent {
            category: "device_behavior".into(),
            confidence: 0.2,
            ..Default::default()
        });
        let intent = parser(engine)
            .parse(&InvestigationQuery::new("hmm"), Duration::from_secs(1))
            .await;
        assert_eq!(intent.category, IssueCategory::Unknown);
        assert!(intent.ambiguous);
    }

    #[tokio::test]
    async fn test_engine_entities_are_merged() {
        let mut entities = std::collections::BTreeMap::new();
        entities.insert(
            "workspace_ids".to_string(),
            vec!["AAAAAAAA-0000-0000-0000-000000000000".to_string()],
        );
        let engine = StubReasoningEngine::new().with_intent(EngineIntent {
            category: "account_issue".into(),
            entities,
            confidence: 0.8,
            ..Default::default()
        });
        let intent = parser(engine)
            .parse(
                &InvestigationQuery::new("ID: 49aa8687-041e-471e-9188-8b0b13d930b3"),
                Duration::from_secs(1),
            )
            .await;
        assert_eq!(
            intent.first(EntityKind::WorkspaceId),
            Some("aaaaaaaa-0000-0000-0000-000000000000")
        );
        assert!(intent.first(EntityKind::DeviceId).is_some());
        assert_eq!(intent.category, IssueCategory::AccountIssue);
    }
}
