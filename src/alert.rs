//! Alert & Report Engine (spec §6 Alerting/Reporting, kept interface-level):
//! evaluates performance/quality/health thresholds against observed
//! snapshots and routes notifications to configured channels — grounded on
//! the teacher's `IncidentNotifier`/`SeverityRouting` channel-dispatch shape
//! in `incident.rs`, adapted to this crate's threshold vocabulary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AlertThresholds, NotificationChannel};

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("notification channel {0:?} is not configured")]
    ChannelUnavailable(NotificationChannel),
    #[error("rate limit exceeded for channel {0:?}")]
    RateLimited(NotificationChannel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Performance,
    Quality,
    Health,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNotification {
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub metric: String,
    pub observed: f64,
    pub threshold: f64,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

/// What the Resolution Engine and telemetry drain task feed in on every
/// evaluation tick; fields absent from a given run are left at defaults,
/// so a partial snapshot only trips the thresholds it actually reports on.
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    pub resolution_time_ms: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub error_rate_percent: Option<f64>,
    pub confidence_score: Option<f64>,
    pub confidence_decline_percent: Option<f64>,
    pub anomaly_score: Option<f64>,
    pub timeout_frequency_percent: Option<f64>,
}

/// Dispatches a rendered alert to one channel. Implementations for
/// `log`/`email`/`webhook`/`slack` live outside this crate's scope — this
/// trait is the seam a host application wires concrete senders into.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn channel(&self) -> NotificationChannel;
    async fn send(&self, notification: &AlertNotification) -> Result<(), AlertError>;
}

/// Always-available sink that routes through `tracing`; the only sink this
/// crate implements directly, matching the teacher's `LogAlertChannel`.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Log
    }

    async fn send(&self, notification: &AlertNotification) -> Result<(), AlertError> {
        match notification.severity {
            AlertSeverity::Critical | AlertSeverity::High => {
                tracing::error!(
                    category = ?notification.category,
                    metric = %notification.metric,
                    observed = notification.observed,
                    threshold = notification.threshold,
                    "{}",
                    notification.message
                );
            }
            AlertSeverity::Medium | AlertSeverity::Low => {
                tracing::warn!(
                    category = ?notification.category,
                    metric = %notification.metric,
                    observed = notification.observed,
                    threshold = notification.threshold,
                    "{}",
                    notification.message
                );
            }
        }
        Ok(())
    }
}

fn severity_for(category: AlertCategory, gap_ratio: f64) -> AlertSeverity {
    match category {
        AlertCategory::Health => {
            if gap_ratio > 1.0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::High
            }
        }
        _ => {
            if gap_ratio > 0.5 {
                AlertSeverity::High
            } else if gap_ratio > 0.2 {
                AlertSeverity::Medium
            } else {
                AlertSeverity::Low
            }
        }
    }
}

fn over(label: &str, category: AlertCategory, observed: f64, threshold: f64) -> Option<AlertNotification> {
    if threshold <= 0.0 || observed <= threshold {
        return None;
    }
    let gap_ratio = (observed - threshold) / threshold;
    Some(AlertNotification {
        category,
        severity: severity_for(category, gap_ratio),
        metric: label.to_string(),
        observed,
        threshold,
        message: format!("{label} is {observed:.2}, above threshold {threshold:.2}"),
        triggered_at: Utc::now(),
    })
}

fn under(label: &str, category: AlertCategory, observed: f64, threshold: f64) -> Option<AlertNotification> {
    if threshold <= 0.0 || observed >= threshold {
        return None;
    }
    let gap_ratio = (threshold - observed) / threshold;
    Some(AlertNotification {
        category,
        severity: severity_for(category, gap_ratio),
        metric: label.to_string(),
        observed,
        threshold,
        message: format!("{label} is {observed:.2}, below threshold {threshold:.2}"),
        triggered_at: Utc::now(),
    })
}

/// Evaluates a snapshot against configured thresholds, producing zero or
/// more notifications; dispatch is the caller's responsibility via
/// `NotificationSink` implementations registered for the session.
pub struct AlertEngine {
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<AlertNotification> {
        let mut notifications = Vec::new();
        if let Some(value) = snapshot.resolution_time_ms {
            notifications.extend(over(
                "resolution_time_ms",
                AlertCategory::Performance,
                value,
                self.thresholds.performance.resolution_time_ms,
            ));
        }
        if let Some(value) = snapshot.memory_usage_mb {
            notifications.extend(over(
                "memory_usage_mb",
                AlertCategory::Performance,
                value,
                self.thresholds.performance.memory_usage_mb,
            ));
        }
        if let Some(value) = snapshot.error_rate_percent {
            notifications.extend(over(
                "error_rate_percent",
                AlertCategory::Performance,
                value,
                self.thresholds.performance.error_rate_percent,
            ));
        }
        if let Some(value) = snapshot.confidence_score {
            notifications.extend(under(
                "confidence_score",
                AlertCategory::Quality,
                value,
                self.thresholds.quality.confidence_score,
            ));
        }
        if let Some(value) = snapshot.confidence_decline_percent {
            notifications.extend(over(
                "confidence_decline_percent",
                AlertCategory::Quality,
                value,
                self.thresholds.quality.decline_percent,
            ));
        }
        if let Some(value) = snapshot.anomaly_score {
            notifications.extend(over(
                "anomaly_score",
                AlertCategory::Health,
                value,
                self.thresholds.health.anomaly_threshold,
            ));
        }
        if let Some(value) = snapshot.timeout_frequency_percent {
            notifications.extend(over(
                "timeout_frequency_percent",
                AlertCategory::Health,
                value,
                self.thresholds.health.timeout_frequency_percent,
            ));
        }
        notifications
    }

    /// Dispatches each notification to every sink that claims a matching
    /// channel among `channels`; a sink failing to send is logged and
    /// does not block the remaining sinks.
    pub async fn emit(
        &self,
        notifications: &[AlertNotification],
        sinks: &[&(dyn NotificationSink)],
        channels: &[NotificationChannel],
    ) {
        for notification in notifications {
            for sink in sinks {
                if !channels.contains(&sink.channel()) {
                    continue;
                }
                if let Err(err) = sink.send(notification).await {
                    tracing::warn!(error = %err, channel = ?sink.channel(), "alert dispatch failed");
                }
            }
        }
    }
}
