//! End-to-end scenarios and cross-cutting invariants exercised against
//! the crate's public API, one file per concern the way the teacher
//! keeps `tests/plan_store.rs` focused on a single subsystem.

use std::sync::Arc;

use async_trait::async_trait;
use selector_core::{
    Checkpoint, DocumentDriver, DriverError, InMemoryDocument, InMemoryDriver, InMemoryNode,
    MetricsStore, ResolutionEngine, SelectorRegistry, SemanticSelector, StorageResult,
    StrategyConfig, StrategyPattern, TelemetryCollector, TelemetryConfig, TelemetryEvent,
    ThresholdManager, ValidationRule, ValidationRuleType,
};

#[derive(Default)]
struct RecordingStorage {
    events: tokio::sync::Mutex<Vec<TelemetryEvent>>,
}

#[async_trait]
impl selector_core::EventStorage for RecordingStorage {
    async fn store_event(&self, event: &TelemetryEvent) -> StorageResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn store_events_batch(&self, events: &[TelemetryEvent]) -> StorageResult<()> {
        self.events.lock().await.extend(events.iter().cloned());
        Ok(())
    }

    async fn load_events(
        &self,
        _selector_name: Option<&str>,
        _limit: Option<usize>,
    ) -> StorageResult<Vec<TelemetryEvent>> {
        Ok(self.events.lock().await.clone())
    }
}

fn document_with(team_name: &str) -> InMemoryDriver {
    InMemoryDriver::new(InMemoryDocument::new(
        InMemoryNode::new("div", "").with_child(
            InMemoryNode::new("span", team_name)
                .with_class("team-name")
                .with_attr("data-testid", "home-team"),
        ),
        "https://example.test",
        "title",
    ))
}

fn engine() -> (ResolutionEngine, Arc<SelectorRegistry>) {
    let registry = Arc::new(SelectorRegistry::default());
    let thresholds = Arc::new(ThresholdManager::default());
    let metrics = Arc::new(MetricsStore::default());
    (
        ResolutionEngine::new(registry.clone(), thresholds, metrics),
        registry,
    )
}

/// Scenario E1 — happy path, text anchor wins on the first try.
#[tokio::test]
async fn scenario_e1_happy_path_text_anchor_wins() {
    let (engine, registry) = engine();
    let selector = SemanticSelector::new(
        "home_team_name",
        "",
        "testing",
        vec![
            StrategyPattern::new(
                "text_anchor",
                1,
                StrategyConfig::TextAnchor {
                    anchor_text: "Manchester United".into(),
                    proximity_selector: Some(".team-name".into()),
                    case_sensitive: false,
                },
            ),
            StrategyPattern::new(
                "attribute_match",
                2,
                StrategyConfig::AttributeMatch {
                    attribute: "data-testid".into(),
                    value_pattern: "^home-team$".into(),
                    element_tag: None,
                },
            ),
        ],
        vec![ValidationRule::new(ValidationRuleType::Regex, "^[A-Za-z ]+$", true, 0.4).unwrap()],
        0.4,
    )
    .unwrap();
    registry.register(selector).await.unwrap();

    let driver = document_with("Manchester United");
    let result = engine
        .resolve("home_team_name", &driver, None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.strategy_used, "text_anchor");
    assert_eq!(
        result.element_info.as_ref().unwrap().text_content,
        "Manchester United"
    );
}

/// Scenario E2 — a case-sensitive miss on the primary strategy falls
/// through to the next one in priority order.
#[tokio::test]
async fn scenario_e2_case_sensitive_miss_falls_back() {
    let (engine, registry) = engine();
    let selector = SemanticSelector::new(
        "home_team_name",
        "",
        "testing",
        vec![
            StrategyPattern::new(
                "text_anchor",
                1,
                StrategyConfig::TextAnchor {
                    anchor_text: "Manchester United".into(),
                    proximity_selector: Some(".team-name".into()),
                    case_sensitive: true,
                },
            ),
            StrategyPattern::new(
                "attribute_match",
                2,
                StrategyConfig::AttributeMatch {
                    attribute: "data-testid".into(),
                    value_pattern: "^home-team$".into(),
                    element_tag: None,
                },
            ),
        ],
        vec![],
        0.1,
    )
    .unwrap();
    registry.register(selector).await.unwrap();

    let driver = document_with("manchester united");
    let result = engine
        .resolve("home_team_name", &driver, None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.strategy_used, "attribute_match");
}

/// Scenario E3 — a match is found but confidence never clears the
/// applicable threshold; resolution reports failure with the expected
/// reason and the attempt is visible in the threshold violations log.
#[tokio::test]
async fn scenario_e3_threshold_violation() {
    let (engine, registry) = engine();
    let selector = SemanticSelector::new(
        "home_team_name",
        "",
        "production",
        vec![StrategyPattern::new(
            "text_anchor",
            1,
            StrategyConfig::TextAnchor {
                anchor_text: "Manchester United".into(),
                proximity_selector: None,
                case_sensitive: false,
            },
        )],
        vec![ValidationRule::new(ValidationRuleType::Regex, "^[0-9]+$", true, 0.5).unwrap()],
        0.85,
    )
    .unwrap();
    registry.register(selector).await.unwrap();

    let driver = document_with("Manchester United");
    let result = engine
        .resolve("home_team_name", &driver, None)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(
        result.failure_reason.as_deref(),
        Some("no_strategy_met_threshold")
    );
    assert_eq!(result.confidence_score, 0.0);
}

/// Scenario E4 — telemetry buffer overflow evicts the oldest events and
/// counts each eviction.
#[tokio::test]
async fn scenario_e4_buffer_overflow_evicts_oldest() {
    let collector = TelemetryCollector::new(
        TelemetryConfig {
            buffer_capacity: 3,
            ..Default::default()
        },
        Arc::new(RecordingStorage::default()),
    );

    for i in 0..5 {
        collector
            .collect_event(
                "home_team_name",
                selector_core::OperationType::Resolution,
                Some(format!("e{i}")),
                |_| {},
            )
            .await
            .unwrap();
    }

    assert_eq!(collector.buffer_overflows().await, 2);
}

/// Scenario E5 — a checkpoint written under an old schema migrates
/// forward to the current one, with the migration-added fields present.
#[tokio::test]
async fn scenario_e5_checkpoint_migration_chain() {
    let mut checkpoint = Checkpoint::new("job-1", serde_json::json!({"progress": {"step": 1}}));
    checkpoint.schema_version = "1.0.0".to_string();

    selector_core::checkpoint::migration::migrate(&mut checkpoint).unwrap();

    assert_eq!(
        checkpoint.schema_version,
        selector_core::CURRENT_SCHEMA_VERSION
    );
    assert_eq!(checkpoint.data["retry_count"], 0);
    assert!(checkpoint.data["correlation_id"].is_null());
    assert_eq!(checkpoint.data["progress"]["step"], 1);
}

/// Scenario E6 — a corrupted checkpoint envelope is detected and its
/// report names a recoverable path.
#[tokio::test]
async fn scenario_e6_corruption_detected() {
    let checkpoint = Checkpoint::new("job-1", serde_json::json!({"progress": 1}));
    let envelope = selector_core::checkpoint::codec::encode(&checkpoint, true, None).unwrap();
    let mut tampered = envelope.clone();
    tampered.checksum = "0".repeat(64);

    let decode_err = selector_core::checkpoint::codec::decode(&tampered, None).unwrap_err();

    let report = selector_core::checkpoint::corruption::detect(
        &checkpoint.checkpoint_id,
        Err(&decode_err),
        None,
        0,
    )
    .unwrap();

    assert_eq!(
        report.corruption_type,
        selector_core::CorruptionType::ChecksumMismatch
    );
    assert_eq!(report.severity, selector_core::CorruptionSeverity::High);
    assert!(report
        .recovery_actions
        .iter()
        .any(|action| action == "restore from backup"));
}

/// Property 1 — every `SelectorResult` a resolution can produce is
/// well-formed, and success only happens at or above threshold.
#[tokio::test]
async fn property_selector_result_is_always_well_formed() {
    let (engine, registry) = engine();
    let selector = SemanticSelector::new(
        "home_team_name",
        "",
        "testing",
        vec![StrategyPattern::new(
            "text_anchor",
            1,
            StrategyConfig::TextAnchor {
                anchor_text: "Manchester United".into(),
                proximity_selector: None,
                case_sensitive: false,
            },
        )],
        vec![],
        0.4,
    )
    .unwrap();
    registry.register(selector).await.unwrap();

    let driver = document_with("Manchester United");
    let result = engine
        .resolve("home_team_name", &driver, None)
        .await
        .unwrap();
    assert!(result.is_well_formed());

    let miss_driver = document_with("Liverpool");
    let miss = engine
        .resolve("home_team_name", &miss_driver, None)
        .await
        .unwrap();
    assert!(miss.is_well_formed());
    assert!(!miss.success);
}

/// Property 7 — adaptive threshold stays bounded and ignores small
/// sample sizes.
#[tokio::test]
async fn property_adaptive_threshold_bounds() {
    let manager = ThresholdManager::default();
    let tiny_sample = selector_core::confidence::PerformanceSnapshot {
        total_attempts: 3,
        success_rate: 0.99,
        avg_confidence: 0.99,
    };
    let base = manager.get("production", None).await.unwrap();
    let unaffected = manager.adaptive("production", tiny_sample).await.unwrap();
    assert_eq!(unaffected, base);

    let large_sample = selector_core::confidence::PerformanceSnapshot {
        total_attempts: 100,
        success_rate: 0.99,
        avg_confidence: 0.99,
    };
    let adjusted = manager.adaptive("production", large_sample).await.unwrap();
    assert!((0.4..=0.95).contains(&adjusted));
}

/// Dummy driver used only to assert `DocumentDriver` stays object-safe
/// and usable behind a trait object, matching the duck-typed-driver
/// design note.
struct AlwaysEmptyDriver;

#[async_trait]
impl DocumentDriver for AlwaysEmptyDriver {
    async fn query_one(&self, _expr: &str) -> Result<Option<selector_core::Element>, DriverError> {
        Ok(None)
    }
    async fn query_all(&self, _expr: &str) -> Result<Vec<selector_core::Element>, DriverError> {
        Ok(vec![])
    }
    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Ok(serde_json::Value::Null)
    }
    async fn current_url(&self) -> Result<String, DriverError> {
        Ok("about:blank".to_string())
    }
    async fn current_title(&self) -> Result<String, DriverError> {
        Ok(String::new())
    }
}

#[tokio::test]
async fn resolution_engine_accepts_any_document_driver_impl() {
    let (engine, registry) = engine();
    let selector = SemanticSelector::new(
        "home_team_name",
        "",
        "testing",
        vec![StrategyPattern::new(
            "text_anchor",
            1,
            StrategyConfig::TextAnchor {
                anchor_text: "Manchester United".into(),
                proximity_selector: None,
                case_sensitive: false,
            },
        )],
        vec![],
        0.4,
    )
    .unwrap();
    registry.register(selector).await.unwrap();

    let driver = AlwaysEmptyDriver;
    let result = engine
        .resolve("home_team_name", &driver, None)
        .await
        .unwrap();
    assert!(!result.success);
}
