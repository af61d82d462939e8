//! Strategy Metrics: per-(selector, strategy) EMA counters (spec §3's
//! `ConfidenceMetrics`) plus the periodic Drift Analyzer (§4.6).

mod drift;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub use drift::{DriftAnalysis, DriftAnalyzer, PerformanceTrend, TrendDirection};

use crate::model::ema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceMetrics {
    pub successful: u64,
    pub failed: u64,
    pub avg_confidence: f64,
    pub avg_resolution_time: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub current_streak: i64,
}

impl Default for ConfidenceMetrics {
    fn default() -> Self {
        Self {
            successful: 0,
            failed: 0,
            avg_confidence: 0.0,
            avg_resolution_time: 0.0,
            last_success: None,
            last_failure: None,
            current_streak: 0,
        }
    }
}

impl ConfidenceMetrics {
    pub fn total_attempts(&self) -> u64 {
        self.successful + self.failed
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_attempts();
        if total == 0 {
            0.0
        } else {
            self.successful as f64 / total as f64
        }
    }

    pub fn reliability_score(&self) -> f64 {
        0.7 * self.success_rate() + 0.3 * self.avg_confidence
    }

    pub fn record(&mut self, success: bool, confidence: f64, resolution_time_ms: f64) {
        const ALPHA: f64 = 0.1;
        let seed = self.total_attempts() == 0;
        self.avg_confidence = ema(self.avg_confidence, confidence, ALPHA, seed);
        self.avg_resolution_time = ema(self.avg_resolution_time, resolution_time_ms, ALPHA, seed);
        let now = Utc::now();
        if success {
            self.successful += 1;
            self.last_success = Some(now);
            self.current_streak = if self.current_streak >= 0 {
                self.current_streak + 1
            } else {
                1
            };
        } else {
            self.failed += 1;
            self.last_failure = Some(now);
            self.current_streak = if self.current_streak <= 0 {
                self.current_streak - 1
            } else {
                -1
            };
        }
    }
}

/// One history sample, kept so the Drift Analyzer can compute trends over
/// a window without re-deriving them from raw telemetry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricSample {
    pub at: DateTime<Utc>,
    pub success: bool,
    pub confidence: f64,
    pub resolution_time_ms: f64,
    pub strategy_active: bool,
}

#[derive(Default)]
struct MetricsEntry {
    metrics: ConfidenceMetrics,
    samples: Vec<MetricSample>,
}

/// Metric updates for a given `(selector, strategy)` pair are serialized by
/// confining them to that pair's `Mutex`, matching the teacher's
/// `Arc<Mutex<BrowserMetrics>>` sharding rather than per-entry actors.
#[derive(Default)]
pub struct MetricsStore {
    entries: Mutex<HashMap<(String, String), Arc<Mutex<MetricsEntry>>>>,
}

impl MetricsStore {
    async fn entry(&self, selector: &str, strategy: &str) -> Arc<Mutex<MetricsEntry>> {
        let mut entries = self.entries.lock().await;
        entries
            .entry((selector.to_string(), strategy.to_string()))
            .or_default()
            .clone()
    }

    pub async fn record(
        &self,
        selector: &str,
        strategy: &str,
        success: bool,
        confidence: f64,
        resolution_time_ms: f64,
        strategy_active: bool,
    ) {
        let entry = self.entry(selector, strategy).await;
        let mut entry = entry.lock().await;
        entry.metrics.record(success, confidence, resolution_time_ms);
        entry.samples.push(MetricSample {
            at: Utc::now(),
            success,
            confidence,
            resolution_time_ms,
            strategy_active,
        });
    }

    pub async fn get(&self, selector: &str, strategy: &str) -> ConfidenceMetrics {
        let entry = self.entry(selector, strategy).await;
        let entry = entry.lock().await;
        entry.metrics.clone()
    }

    pub async fn samples_in_window(
        &self,
        selector: &str,
        strategy: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<MetricSample> {
        let entry = self.entry(selector, strategy).await;
        let entry = entry.lock().await;
        entry
            .samples
            .iter()
            .copied()
            .filter(|s| s.at >= from && s.at <= to)
            .collect()
    }

    pub async fn strategies_for(&self, selector: &str) -> Vec<String> {
        let entries = self.entries.lock().await;
        entries
            .keys()
            .filter(|(sel, _)| sel == selector)
            .map(|(_, strategy)| strategy.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_flips_sign_on_failure_after_success() {
        let mut metrics = ConfidenceMetrics::default();
        metrics.record(true, 0.9, 100.0);
        metrics.record(true, 0.9, 100.0);
        assert_eq!(metrics.current_streak, 2);
        metrics.record(false, 0.2, 100.0);
        assert_eq!(metrics.current_streak, -1);
        metrics.record(false, 0.2, 100.0);
        assert_eq!(metrics.current_streak, -2);
    }

    #[tokio::test]
    async fn store_serializes_updates_per_pair() {
        let store = MetricsStore::default();
        store
            .record("home_team_name", "text_anchor", true, 0.9, 12.0, true)
            .await;
        store
            .record("home_team_name", "text_anchor", false, 0.4, 15.0, true)
            .await;
        let metrics = store.get("home_team_name", "text_anchor").await;
        assert_eq!(metrics.total_attempts(), 2);
    }
}
