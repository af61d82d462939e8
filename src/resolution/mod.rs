//! Resolution Engine (spec §4.3): the orchestrator that walks a selector's
//! active strategies in priority order, scores each match, and commits the
//! first one clearing the effective threshold.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::confidence::ThresholdManager;
use crate::driver::{DocumentDriver, DriverError};
use crate::metrics::MetricsStore;
use crate::model::{SelectorResult, SemanticSelector};
use crate::registry::{RegistryError, SelectorRegistry};
use crate::strategy::AttemptOutcome;
use crate::telemetry::{
    ErrorData, OperationType, QualityMetrics, StrategyMetrics, TelemetryCollector,
};
use crate::validation::ValidationEngine;

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Threshold(#[from] crate::confidence::ThresholdError),
}

/// Per-strategy timeout default (§4.3's `T_strategy`).
const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ResolutionEngine {
    registry: Arc<SelectorRegistry>,
    thresholds: Arc<ThresholdManager>,
    metrics: Arc<MetricsStore>,
    validation: ValidationEngine,
    telemetry: Option<Arc<TelemetryCollector>>,
    strategy_timeout: Duration,
}

impl ResolutionEngine {
    pub fn new(
        registry: Arc<SelectorRegistry>,
        thresholds: Arc<ThresholdManager>,
        metrics: Arc<MetricsStore>,
    ) -> Self {
        Self {
            registry,
            thresholds,
            metrics,
            validation: ValidationEngine::default(),
            telemetry: None,
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryCollector>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }

    /// Resolves `selector_name` against `driver`, trying active strategies
    /// by ascending priority until one commits or all are exhausted.
    pub async fn resolve(
        &self,
        selector_name: &str,
        driver: &dyn DocumentDriver,
        sub_context: Option<&str>,
    ) -> Result<SelectorResult, ResolutionError> {
        let started = std::time::Instant::now();
        let Some(selector) = self.registry.get(selector_name).await else {
            return Ok(SelectorResult::failure(
                selector_name,
                "none",
                "selector_not_found",
                started.elapsed().as_secs_f64() * 1000.0,
                vec![],
            ));
        };

        let threshold = self.thresholds.get(&selector.context, sub_context).await?;
        let mut execution_order = Vec::new();
        let mut driver_error_seen = false;

        let result = self
            .try_strategies(&selector, driver, threshold, &mut execution_order, &mut driver_error_seen)
            .await;

        let total_ms = started.elapsed().as_secs_f64() * 1000.0;
        let result = match result {
            Some(mut result) => {
                result.resolution_time_ms = total_ms;
                result
            }
            None => SelectorResult::failure(
                selector_name,
                execution_order.last().cloned().unwrap_or_default(),
                if driver_error_seen {
                    "driver:all_strategies_exhausted".to_string()
                } else {
                    "no_strategy_met_threshold".to_string()
                },
                total_ms,
                vec![],
            ),
        };

        self.emit_telemetry(&selector, &result, &execution_order)
            .await;
        Ok(result)
    }

    async fn try_strategies(
        &self,
        selector: &SemanticSelector,
        driver: &dyn DocumentDriver,
        threshold: f64,
        execution_order: &mut Vec<String>,
        driver_error_seen: &mut bool,
    ) -> Option<SelectorResult> {
        for strategy in selector.active_strategies() {
            execution_order.push(strategy.id.clone());
            let attempt_started = std::time::Instant::now();

            let outcome = match tokio::time::timeout(
                self.strategy_timeout,
                strategy.config.attempt(driver),
            )
            .await
            {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    self.record_attempt_failure(selector, strategy, attempt_started, &err)
                        .await;
                    *driver_error_seen = true;
                    continue;
                }
                Err(_) => {
                    warn!(
                        selector = %selector.name,
                        strategy = %strategy.id,
                        "strategy attempt timed out"
                    );
                    self.metrics
                        .record(
                            &selector.name,
                            &strategy.id,
                            false,
                            0.0,
                            attempt_started.elapsed().as_secs_f64() * 1000.0,
                            strategy.is_active,
                        )
                        .await;
                    self.registry
                        .update_strategy_stats(
                            &selector.name,
                            &strategy.id,
                            false,
                            attempt_started.elapsed().as_secs_f64() * 1000.0,
                        )
                        .await;
                    *driver_error_seen = true;
                    continue;
                }
            };

            let element_info = match outcome {
                AttemptOutcome::NoMatch { .. } => {
                    self.record_outcome(selector, strategy, false, 0.0, attempt_started)
                        .await;
                    continue;
                }
                AttemptOutcome::Match(element_info) => element_info,
            };

            let validation_results = self
                .validation
                .validate_all(&element_info.text_content, &selector.validation_rules);
            let required_rule_failed = selector
                .validation_rules
                .iter()
                .zip(&validation_results)
                .any(|(rule, result)| rule.required && !result.passed);
            let validation_score = ValidationEngine::aggregate_score(&validation_results);

            let confidence = if required_rule_failed {
                0.0
            } else {
                0.4 * strategy.cold_start_clamped_success_rate() + 0.6 * validation_score
            };
            let resolution_time_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;

            if confidence >= threshold {
                self.record_outcome(selector, strategy, true, confidence, attempt_started)
                    .await;
                info!(
                    selector = %selector.name,
                    strategy = %strategy.id,
                    confidence,
                    "selector_resolved"
                );
                return Some(SelectorResult::success(
                    &selector.name,
                    &strategy.id,
                    element_info,
                    confidence,
                    resolution_time_ms,
                    validation_results,
                ));
            }

            self.record_outcome(selector, strategy, false, confidence, attempt_started)
                .await;
        }
        None
    }

    async fn record_outcome(
        &self,
        selector: &SemanticSelector,
        strategy: &crate::model::StrategyPattern,
        success: bool,
        confidence: f64,
        attempt_started: std::time::Instant,
    ) {
        let resolution_time_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;
        self.metrics
            .record(
                &selector.name,
                &strategy.id,
                success,
                confidence,
                resolution_time_ms,
                strategy.is_active,
            )
            .await;
        self.registry
            .update_strategy_stats(&selector.name, &strategy.id, success, resolution_time_ms)
            .await;
    }

    async fn record_attempt_failure(
        &self,
        selector: &SemanticSelector,
        strategy: &crate::model::StrategyPattern,
        attempt_started: std::time::Instant,
        err: &DriverError,
    ) {
        warn!(
            selector = %selector.name,
            strategy = %strategy.id,
            error = %err,
            "strategy attempt failed"
        );
        self.record_outcome(selector, strategy, false, 0.0, attempt_started)
            .await;
    }

    async fn emit_telemetry(
        &self,
        selector: &SemanticSelector,
        result: &SelectorResult,
        execution_order: &[String],
    ) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let selector_name = selector.name.clone();
        let success = result.success;
        let confidence_score = result.confidence_score;
        let strategy_used = result.strategy_used.clone();
        let resolution_time_ms = result.resolution_time_ms;
        let failure_reason = result.failure_reason.clone();
        let execution_order = execution_order.to_vec();

        let outcome = telemetry
            .collect_event(
                &selector_name,
                OperationType::Resolution,
                None,
                move |event| {
                    event.quality_metrics = Some(QualityMetrics {
                        confidence_score: Some(confidence_score),
                        success: Some(success),
                        validation_passed: Some(success),
                        ..Default::default()
                    });
                    event.strategy_metrics = Some(StrategyMetrics {
                        primary_strategy: strategy_used.clone(),
                        strategy_execution_order: execution_order,
                        ..Default::default()
                    });
                    event.performance_metrics = Some(crate::telemetry::PerformanceMetrics {
                        resolution_time_ms: Some(resolution_time_ms),
                        ..Default::default()
                    });
                    if !success {
                        event.error_data = Some(ErrorData {
                            error_type: "resolution_failed".to_string(),
                            error_message: failure_reason.clone().unwrap_or_default(),
                            ..Default::default()
                        });
                    }
                },
            )
            .await;
        if let Err(err) = outcome {
            warn!(selector = %selector.name, error = %err, "failed to record telemetry for resolution");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{InMemoryDocument, InMemoryDriver, InMemoryNode};
    use crate::model::{SemanticSelector, StrategyPattern, ValidationRule, ValidationRuleType};
    use crate::strategy::StrategyConfig;

    fn build_engine() -> (ResolutionEngine, Arc<SelectorRegistry>) {
        let registry = Arc::new(SelectorRegistry::default());
        let thresholds = Arc::new(ThresholdManager::default());
        let metrics = Arc::new(MetricsStore::default());
        (
            ResolutionEngine::new(registry.clone(), thresholds, metrics),
            registry,
        )
    }

    fn document_with_anchor() -> InMemoryDocument {
        InMemoryDocument::new(
            InMemoryNode::new("div", "").with_child(
                InMemoryNode::new("span", "Manchester United").with_class("team-name"),
            ),
            "https://example.test",
            "title",
        )
    }

    #[tokio::test]
    async fn resolves_successfully_when_confidence_clears_threshold() {
        let (engine, registry) = build_engine();
        let selector = SemanticSelector::new(
            "home_team_name",
            "",
            "testing",
            vec![StrategyPattern::new(
                "p1",
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

        let driver = InMemoryDriver::new(document_with_anchor());
        let result = engine
            .resolve("home_team_name", &driver, None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.strategy_used, "p1");
    }

    #[tokio::test]
    async fn unknown_selector_fails_with_selector_not_found() {
        let (engine, _registry) = build_engine();
        let driver = InMemoryDriver::new(document_with_anchor());
        let result = engine.resolve("missing", &driver, None).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failure_reason.as_deref(), Some("selector_not_found"));
    }

    #[tokio::test]
    async fn required_validation_failure_forces_zero_confidence() {
        let (engine, registry) = build_engine();
        let selector = SemanticSelector::new(
            "home_team_name",
            "",
            "testing",
            vec![StrategyPattern::new(
                "p1",
                1,
                StrategyConfig::TextAnchor {
                    anchor_text: "Manchester United".into(),
                    proximity_selector: None,
                    case_sensitive: false,
                },
            )],
            vec![ValidationRule::new(ValidationRuleType::Regex, "^[0-9]+$", true, 0.5).unwrap()],
            0.1,
        )
        .unwrap();
        registry.register(selector).await.unwrap();

        let driver = InMemoryDriver::new(document_with_anchor());
        let result = engine
            .resolve("home_team_name", &driver, None)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.failure_reason.as_deref(),
            Some("no_strategy_met_threshold")
        );
    }

    #[tokio::test]
    async fn no_match_falls_through_to_next_strategy_by_priority() {
        let (engine, registry) = build_engine();
        let selector = SemanticSelector::new(
            "home_team_name",
            "",
            "testing",
            vec![
                StrategyPattern::new(
                    "p1",
                    1,
                    StrategyConfig::TextAnchor {
                        anchor_text: "Liverpool".into(),
                        proximity_selector: None,
                        case_sensitive: false,
                    },
                ),
                StrategyPattern::new(
                    "p2",
                    2,
                    StrategyConfig::TextAnchor {
                        anchor_text: "Manchester United".into(),
                        proximity_selector: None,
                        case_sensitive: false,
                    },
                ),
            ],
            vec![],
            0.4,
        )
        .unwrap();
        registry.register(selector).await.unwrap();

        let driver = InMemoryDriver::new(document_with_anchor());
        let result = engine
            .resolve("home_team_name", &driver, None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.strategy_used, "p2");
    }
}
