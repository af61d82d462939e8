use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MetricSample, MetricsStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Degrading,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PerformanceTrend {
    pub success_rate_trend: f64,
    pub confidence_trend: f64,
    pub performance_trend: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAnalysis {
    pub selector_name: String,
    pub analysis_period: (DateTime<Utc>, DateTime<Utc>),
    pub drift_score: f64,
    pub trend_direction: TrendDirection,
    pub strategy_performance: HashMap<String, PerformanceTrend>,
    pub recommendations: Vec<String>,
    pub manual_review_required: bool,
}

impl DriftAnalysis {
    pub fn requires_immediate_attention(&self) -> bool {
        self.drift_score > 0.8 || self.manual_review_required
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64], series_mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| (v - series_mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Signed first-difference of window-halved means, normalized by the
/// series standard deviation and clipped to [-1, 1].
fn signed_trend(values: &[f64]) -> (f64, f64) {
    let overall_mean = mean(values);
    let volatility = std_dev(values, overall_mean);
    if values.len() < 2 {
        return (0.0, volatility);
    }
    let mid = values.len() / 2;
    let (first_half, second_half) = values.split_at(mid.max(1));
    let delta = mean(second_half) - mean(first_half);
    let trend = if volatility > 0.0 {
        (delta / volatility).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    (trend, volatility)
}

fn strategy_flipped_inactive(samples: &[MetricSample]) -> bool {
    samples
        .windows(2)
        .any(|pair| pair[0].strategy_active && !pair[1].strategy_active)
}

pub struct DriftAnalyzer<'a> {
    metrics: &'a MetricsStore,
}

impl<'a> DriftAnalyzer<'a> {
    pub fn new(metrics: &'a MetricsStore) -> Self {
        Self { metrics }
    }

    pub async fn analyze(
        &self,
        selector_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DriftAnalysis {
        let strategies = self.metrics.strategies_for(selector_name).await;
        let mut strategy_performance = HashMap::new();
        let mut max_abs_component = 0.0_f64;
        let mut any_flip = false;
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for strategy_id in strategies {
            let samples = self
                .metrics
                .samples_in_window(selector_name, &strategy_id, from, to)
                .await;
            if samples.is_empty() {
                continue;
            }
            let success_series: Vec<f64> = samples
                .iter()
                .map(|s| if s.success { 1.0 } else { 0.0 })
                .collect();
            let confidence_series: Vec<f64> = samples.iter().map(|s| s.confidence).collect();
            let time_series: Vec<f64> = samples.iter().map(|s| s.resolution_time_ms).collect();

            let (success_rate_trend, sr_vol) = signed_trend(&success_series);
            let (confidence_trend, conf_vol) = signed_trend(&confidence_series);
            let (time_trend, time_vol) = signed_trend(&time_series);
            let performance_trend = -time_trend;
            let volatility = (sr_vol + conf_vol + time_vol) / 3.0;

            max_abs_component = max_abs_component
                .max(success_rate_trend.abs())
                .max(confidence_trend.abs());

            let weight = samples.len() as f64;
            weighted_sum += weight * (success_rate_trend + confidence_trend + performance_trend) / 3.0;
            weight_total += weight;

            if strategy_flipped_inactive(&samples) {
                any_flip = true;
            }

            strategy_performance.insert(
                strategy_id,
                PerformanceTrend {
                    success_rate_trend,
                    confidence_trend,
                    performance_trend,
                    volatility,
                },
            );
        }

        let drift_score = max_abs_component.clamp(0.0, 1.0);
        let weighted_mean = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };
        let trend_direction = if weighted_mean > 0.1 {
            TrendDirection::Improving
        } else if weighted_mean < -0.1 {
            TrendDirection::Degrading
        } else {
            TrendDirection::Stable
        };
        let manual_review_required = drift_score > 0.8 || any_flip;

        let mut recommendations = Vec::new();
        if manual_review_required {
            recommendations.push(format!(
                "review selector `{selector_name}`: drift_score={drift_score:.2}"
            ));
        }

        DriftAnalysis {
            selector_name: selector_name.to_string(),
            analysis_period: (from, to),
            drift_score,
            trend_direction,
            strategy_performance,
            recommendations,
            manual_review_required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn stable_series_produces_low_drift() {
        let store = MetricsStore::default();
        for _ in 0..20 {
            store
                .record("home_team_name", "text_anchor", true, 0.9, 10.0, true)
                .await;
        }
        let analyzer = DriftAnalyzer::new(&store);
        let analysis = analyzer
            .analyze(
                "home_team_name",
                Utc::now() - Duration::hours(1),
                Utc::now() + Duration::hours(1),
            )
            .await;
        assert!(analysis.drift_score < 0.2);
        assert!(!analysis.manual_review_required);
    }
}
