use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Resolution,
    Validation,
    Execution,
    Cleanup,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub resolution_time_ms: Option<f64>,
    pub strategy_execution_time_ms: Option<f64>,
    pub total_duration_ms: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub cpu_usage_percent: Option<f64>,
    pub network_requests_count: Option<u64>,
    pub dom_operations_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub confidence_score: Option<f64>,
    pub success: Option<bool>,
    pub elements_found: Option<u64>,
    pub strategy_success_rate: Option<f64>,
    pub drift_detected: Option<bool>,
    pub fallback_used: Option<bool>,
    pub validation_passed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub primary_strategy: String,
    pub secondary_strategies: Vec<String>,
    pub strategy_execution_order: Vec<String>,
    pub strategy_success_by_type: HashMap<String, bool>,
    pub strategy_timing_by_type: HashMap<String, f64>,
    pub strategy_switches_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorData {
    pub error_type: String,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub retry_attempts: u64,
    pub fallback_attempts: u64,
    pub recovery_successful: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextData {
    pub browser_session_id: String,
    pub tab_context_id: String,
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub user_agent: Option<String>,
    pub viewport_size: Option<ViewportSize>,
    pub timestamp_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_id: String,
    pub correlation_id: String,
    pub selector_name: String,
    pub timestamp: DateTime<Utc>,
    pub operation_type: OperationType,
    pub performance_metrics: Option<PerformanceMetrics>,
    pub quality_metrics: Option<QualityMetrics>,
    pub strategy_metrics: Option<StrategyMetrics>,
    pub error_data: Option<ErrorData>,
    pub context_data: Option<ContextData>,
}

#[derive(Debug, Error, PartialEq)]
pub enum EventValidationError {
    #[error("selector_name must not be empty")]
    EmptySelectorName,
    #[error("timestamp is in the future")]
    TimestampInFuture,
    #[error("success events must not carry error_data")]
    SuccessWithErrorData,
    #[error("failure events must carry error_data")]
    FailureWithoutErrorData,
    #[error("strategy_metrics.primary_strategy is required")]
    MissingPrimaryStrategy,
}

impl TelemetryEvent {
    pub fn new(
        selector_name: impl Into<String>,
        correlation_id: impl Into<String>,
        operation_type: OperationType,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            correlation_id: correlation_id.into(),
            selector_name: selector_name.into(),
            timestamp: Utc::now(),
            operation_type,
            performance_metrics: None,
            quality_metrics: None,
            strategy_metrics: None,
            error_data: None,
            context_data: None,
        }
    }

    /// §6's cross-field invariants: non-empty selector, no future
    /// timestamps, `success XOR error_data`.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.selector_name.is_empty() {
            return Err(EventValidationError::EmptySelectorName);
        }
        if self.timestamp > Utc::now() {
            return Err(EventValidationError::TimestampInFuture);
        }
        if let Some(success) = self.quality_metrics.as_ref().and_then(|q| q.success) {
            if success && self.error_data.is_some() {
                return Err(EventValidationError::SuccessWithErrorData);
            }
            if !success && self.error_data.is_none() {
                return Err(EventValidationError::FailureWithoutErrorData);
            }
        }
        if let Some(strategy_metrics) = &self.strategy_metrics {
            if strategy_metrics.primary_strategy.is_empty() {
                return Err(EventValidationError::MissingPrimaryStrategy);
            }
        }
        Ok(())
    }
}
