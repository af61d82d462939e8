//! Confidence & Threshold Manager (spec §4.4): per-context confidence
//! thresholds, an append-only change history, and a violations log.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::model::SelectorResult;

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("context must not be empty")]
    EmptyContext,
    #[error("threshold must be in [0,1], got {0}")]
    ThresholdOutOfRange(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdChange {
    pub context: String,
    pub sub_context: Option<String>,
    pub old: f64,
    pub new: f64,
    pub at: DateTime<Utc>,
    pub by: String,
    pub reason: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ViolationSeverity {
    fn from_gap(gap: f64) -> Self {
        if gap >= 0.3 {
            ViolationSeverity::Critical
        } else if gap >= 0.2 {
            ViolationSeverity::Error
        } else if gap >= 0.1 {
            ViolationSeverity::Warning
        } else {
            ViolationSeverity::Info
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdViolation {
    pub selector_name: String,
    pub context: String,
    pub threshold: f64,
    pub confidence: f64,
    pub severity: ViolationSeverity,
    pub at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Aggregated per-(context, strategy) performance numbers fed into
/// `adaptive`; produced by the Drift Analyzer / Metrics store.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceSnapshot {
    pub total_attempts: u64,
    pub success_rate: f64,
    pub avg_confidence: f64,
}

fn default_thresholds() -> HashMap<&'static str, f64> {
    HashMap::from([
        ("production", 0.85),
        ("staging", 0.75),
        ("development", 0.65),
        ("testing", 0.5),
        ("research", 0.4),
    ])
}

struct ThresholdState {
    context_overrides: HashMap<String, f64>,
    sub_context_overrides: HashMap<(String, String), f64>,
    history: Vec<ThresholdChange>,
    violations: Vec<ThresholdViolation>,
}

/// Shared mutable state behind a single `RwLock`: gets take the read lock,
/// sets take the write lock, so a get never observes a half-applied set.
pub struct ThresholdManager {
    defaults: HashMap<&'static str, f64>,
    state: RwLock<ThresholdState>,
}

impl Default for ThresholdManager {
    fn default() -> Self {
        Self {
            defaults: default_thresholds(),
            state: RwLock::new(ThresholdState {
                context_overrides: HashMap::new(),
                sub_context_overrides: HashMap::new(),
                history: Vec::new(),
                violations: Vec::new(),
            }),
        }
    }
}

impl ThresholdManager {
    pub async fn get(&self, context: &str, sub_context: Option<&str>) -> Result<f64, ThresholdError> {
        if context.is_empty() {
            return Err(ThresholdError::EmptyContext);
        }
        let state = self.state.read().await;
        if let Some(sub_context) = sub_context {
            if let Some(value) = state
                .sub_context_overrides
                .get(&(context.to_string(), sub_context.to_string()))
            {
                return Ok(*value);
            }
        }
        if let Some(value) = state.context_overrides.get(context) {
            return Ok(*value);
        }
        Ok(*self
            .defaults
            .get(context)
            .unwrap_or_else(|| &self.defaults["development"]))
    }

    pub async fn set(
        &self,
        context: &str,
        threshold: f64,
        sub_context: Option<&str>,
        reason: impl Into<String>,
        by: impl Into<String>,
    ) -> Result<(), ThresholdError> {
        if context.is_empty() {
            return Err(ThresholdError::EmptyContext);
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ThresholdError::ThresholdOutOfRange(threshold));
        }
        let mut state = self.state.write().await;
        let old = match sub_context {
            Some(sub) => *state
                .sub_context_overrides
                .get(&(context.to_string(), sub.to_string()))
                .unwrap_or(self.defaults.get(context).unwrap_or(&self.defaults["development"])),
            None => *state
                .context_overrides
                .get(context)
                .unwrap_or(self.defaults.get(context).unwrap_or(&self.defaults["development"])),
        };
        match sub_context {
            Some(sub) => {
                state
                    .sub_context_overrides
                    .insert((context.to_string(), sub.to_string()), threshold);
            }
            None => {
                state.context_overrides.insert(context.to_string(), threshold);
            }
        }
        state.history.push(ThresholdChange {
            context: context.to_string(),
            sub_context: sub_context.map(str::to_string),
            old,
            new: threshold,
            at: Utc::now(),
            by: by.into(),
            reason: reason.into(),
            metadata: HashMap::new(),
        });
        info!(context, threshold, "threshold_changed");
        Ok(())
    }

    /// Partitions `results` against `threshold`, recording a
    /// `ThresholdViolation` for each below-threshold result.
    pub async fn filter(
        &self,
        results: Vec<SelectorResult>,
        context: &str,
        sub_context: Option<&str>,
    ) -> Result<(Vec<SelectorResult>, Vec<SelectorResult>), ThresholdError> {
        let threshold = self.get(context, sub_context).await?;
        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let mut state = self.state.write().await;
        for result in results {
            if result.confidence_score >= threshold {
                passed.push(result);
                continue;
            }
            let gap = threshold - result.confidence_score;
            state.violations.push(ThresholdViolation {
                selector_name: result.selector_name.clone(),
                context: context.to_string(),
                threshold,
                confidence: result.confidence_score,
                severity: ViolationSeverity::from_gap(gap),
                at: Utc::now(),
                metadata: HashMap::from([(
                    "result_type".to_string(),
                    serde_json::Value::String(
                        if result.success { "success" } else { "failure" }.to_string(),
                    ),
                )]),
            });
            failed.push(result);
        }
        Ok((passed, failed))
    }

    /// §4.4 adaptive formula; below the minimum sample size the base
    /// threshold is returned unchanged.
    pub async fn adaptive(&self, context: &str, perf: PerformanceSnapshot) -> Result<f64, ThresholdError> {
        let base = self.get(context, None).await?;
        if perf.total_attempts < 10 {
            return Ok(base);
        }
        let sr = perf.success_rate;
        let ac = perf.avg_confidence;
        let delta = -0.1 * (sr - 0.9).max(0.0) - 0.05 * (ac - 0.85).max(0.0)
            + 0.1 * (0.7 - sr).max(0.0);
        Ok((base + delta).clamp(0.4, 0.95))
    }

    pub async fn history(&self) -> Vec<ThresholdChange> {
        self.state.read().await.history.clone()
    }

    pub async fn violations(&self) -> Vec<ThresholdViolation> {
        self.state.read().await.violations.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_fall_back_to_development() {
        let manager = ThresholdManager::default();
        assert_eq!(manager.get("production", None).await.unwrap(), 0.85);
        assert_eq!(manager.get("nonexistent", None).await.unwrap(), 0.65);
    }

    #[tokio::test]
    async fn rejects_out_of_range_threshold() {
        let manager = ThresholdManager::default();
        let err = manager
            .set("production", 1.5, None, "test", "operator")
            .await
            .unwrap_err();
        assert_eq!(err, ThresholdError::ThresholdOutOfRange(1.5));
    }

    #[tokio::test]
    async fn adaptive_requires_minimum_sample_size() {
        let manager = ThresholdManager::default();
        let perf = PerformanceSnapshot {
            total_attempts: 3,
            success_rate: 0.95,
            avg_confidence: 0.9,
        };
        assert_eq!(manager.adaptive("production", perf).await.unwrap(), 0.85);
    }

    #[tokio::test]
    async fn adaptive_relaxes_threshold_on_low_success_rate() {
        let manager = ThresholdManager::default();
        let perf = PerformanceSnapshot {
            total_attempts: 50,
            success_rate: 0.5,
            avg_confidence: 0.6,
        };
        let adapted = manager.adaptive("production", perf).await.unwrap();
        assert!(adapted < 0.85);
    }

    #[tokio::test]
    async fn filter_records_violation_severity() {
        let manager = ThresholdManager::default();
        let result = SelectorResult::failure("home_team_name", "text_anchor", "x", 10.0, vec![]);
        let mut result = result;
        result.confidence_score = 0.62;
        let (_, failed) = manager
            .filter(vec![result], "production", None)
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        let violations = manager.violations().await;
        assert_eq!(violations[0].severity, ViolationSeverity::Error);
    }
}
