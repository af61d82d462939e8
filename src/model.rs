//! Core data model: selectors, strategy patterns, validation rules, and the
//! snapshots/results that flow out of a resolution attempt.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::StrategyConfig;

/// A named, strategy-backed recipe for locating an element in a document.
///
/// Immutable after registration except for the metrics-bearing fields
/// carried inside its strategies (`success_rate`, `avg_resolution_time_ms`,
/// `last_updated`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSelector {
    pub name: String,
    pub description: String,
    pub context: String,
    /// Kept sorted by ascending `StrategyPattern::priority`.
    pub strategies: Vec<StrategyPattern>,
    pub validation_rules: Vec<ValidationRule>,
    pub confidence_threshold: f64,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorDefinitionError {
    #[error("selector name must not be empty")]
    EmptyName,
    #[error("confidence_threshold must be in [0,1]")]
    ThresholdOutOfRange,
    #[error("duplicate strategy priority {0}")]
    DuplicatePriority(u32),
    #[error("selector has no strategies")]
    NoStrategies,
    #[error("strategy priorities must be >= 1, got 0")]
    ZeroPriority,
}

impl SemanticSelector {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        context: impl Into<String>,
        mut strategies: Vec<StrategyPattern>,
        validation_rules: Vec<ValidationRule>,
        confidence_threshold: f64,
    ) -> Result<Self, SelectorDefinitionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SelectorDefinitionError::EmptyName);
        }
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(SelectorDefinitionError::ThresholdOutOfRange);
        }
        if strategies.is_empty() {
            return Err(SelectorDefinitionError::NoStrategies);
        }
        let mut seen = std::collections::HashSet::new();
        for s in &strategies {
            if s.priority == 0 {
                return Err(SelectorDefinitionError::ZeroPriority);
            }
            if !seen.insert(s.priority) {
                return Err(SelectorDefinitionError::DuplicatePriority(s.priority));
            }
        }
        strategies.sort_by_key(|s| s.priority);
        Ok(Self {
            name,
            description: description.into(),
            context: context.into(),
            strategies,
            validation_rules,
            confidence_threshold,
            metadata: HashMap::new(),
        })
    }

    pub fn active_strategies(&self) -> impl Iterator<Item = &StrategyPattern> {
        self.strategies.iter().filter(|s| s.is_active)
    }

    pub fn strategy_mut(&mut self, id: &str) -> Option<&mut StrategyPattern> {
        self.strategies.iter_mut().find(|s| s.id == id)
    }

    /// `register(selector)` idempotence check (§8): same name + structurally
    /// equal definition is a no-op; divergent redefinition is rejected.
    pub fn structurally_equal(&self, other: &SemanticSelector) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.context == other.context
            && self.confidence_threshold == other.confidence_threshold
            && self.validation_rules == other.validation_rules
            && self.strategies.len() == other.strategies.len()
            && self
                .strategies
                .iter()
                .zip(other.strategies.iter())
                .all(|(a, b)| a.id == b.id && a.priority == b.priority && a.config == b.config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    TextAnchor,
    AttributeMatch,
    DomRelationship,
    RoleBased,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::TextAnchor => "text_anchor",
            StrategyType::AttributeMatch => "attribute_match",
            StrategyType::DomRelationship => "dom_relationship",
            StrategyType::RoleBased => "role_based",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyPattern {
    pub id: String,
    pub strategy_type: StrategyType,
    pub priority: u32,
    pub config: StrategyConfig,
    pub success_rate: f64,
    pub avg_resolution_time_ms: f64,
    pub is_active: bool,
    pub attempt_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl StrategyPattern {
    pub fn new(id: impl Into<String>, priority: u32, config: StrategyConfig) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            strategy_type: config.strategy_type(),
            priority,
            config,
            success_rate: 0.0,
            avg_resolution_time_ms: 0.0,
            is_active: true,
            attempt_count: 0,
            created_at: now,
            last_updated: now,
        }
    }

    /// `strategy_base` used by the confidence formula (§4.3): a strategy
    /// with no prior attempts contributes 0.5 at cold start. Once it has
    /// recorded at least one attempt, its real `success_rate` is used
    /// unclamped — a strategy with a genuinely poor track record must be
    /// able to produce low confidence, not be floored forever.
    pub fn cold_start_clamped_success_rate(&self) -> f64 {
        if self.attempt_count == 0 {
            self.success_rate.clamp(0.5, 1.0)
        } else {
            self.success_rate
        }
    }

    /// EMA update with alpha = 0.1, used by both the StrategyPattern's own
    /// rolling stats and by `ConfidenceMetrics`.
    pub fn record_attempt(&mut self, success: bool, resolution_time_ms: f64) {
        const ALPHA: f64 = 0.1;
        let seed = self.attempt_count == 0;
        let success_value = if success { 1.0 } else { 0.0 };
        self.success_rate = ema(self.success_rate, success_value, ALPHA, seed);
        self.avg_resolution_time_ms = ema(self.avg_resolution_time_ms, resolution_time_ms, ALPHA, seed);
        self.attempt_count += 1;
        self.last_updated = Utc::now();
    }
}

/// Exponential moving average update. On the very first observation the
/// EMA is seeded with that observation rather than blended against zero.
pub(crate) fn ema(previous: f64, observation: f64, alpha: f64, seed: bool) -> f64 {
    if seed {
        observation
    } else {
        alpha * observation + (1.0 - alpha) * previous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRuleType {
    Regex,
    DataType,
    Semantic,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub rule_type: ValidationRuleType,
    pub pattern: String,
    pub required: bool,
    pub weight: f64,
}

#[derive(Debug, Error)]
pub enum ValidationRuleError {
    #[error("required validation rules must have weight > 0")]
    RequiredRuleHasZeroWeight,
    #[error("weight must be in [0,1], got {0}")]
    WeightOutOfRange(f64),
}

impl ValidationRule {
    pub fn new(
        rule_type: ValidationRuleType,
        pattern: impl Into<String>,
        required: bool,
        weight: f64,
    ) -> Result<Self, ValidationRuleError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(ValidationRuleError::WeightOutOfRange(weight));
        }
        if required && weight <= 0.0 {
            return Err(ValidationRuleError::RequiredRuleHasZeroWeight);
        }
        Ok(Self {
            rule_type,
            pattern: pattern.into(),
            required,
            weight,
        })
    }
}

/// Snapshot of a matched element. Never a live handle back into the
/// document — the driver is queried again on every resolution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag_name: String,
    pub text_content: String,
    pub attributes: HashMap<String, String>,
    pub css_classes: Vec<String>,
    pub dom_path: String,
    pub visibility: bool,
    pub interactable: bool,
}

impl ElementInfo {
    pub fn class_tokens(&self) -> impl Iterator<Item = &str> {
        self.css_classes.iter().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule_type: ValidationRuleType,
    pub passed: bool,
    pub score: f64,
    pub message: String,
    pub weight: f64,
    pub details: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorResult {
    pub selector_name: String,
    pub strategy_used: String,
    pub element_info: Option<ElementInfo>,
    pub confidence_score: f64,
    pub resolution_time_ms: f64,
    pub validation_results: Vec<ValidationResult>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub failure_reason: Option<String>,
}

impl SelectorResult {
    pub fn success(
        selector_name: impl Into<String>,
        strategy_used: impl Into<String>,
        element_info: ElementInfo,
        confidence_score: f64,
        resolution_time_ms: f64,
        validation_results: Vec<ValidationResult>,
    ) -> Self {
        Self {
            selector_name: selector_name.into(),
            strategy_used: strategy_used.into(),
            element_info: Some(element_info),
            confidence_score,
            resolution_time_ms,
            validation_results,
            success: true,
            timestamp: Utc::now(),
            failure_reason: None,
        }
    }

    pub fn failure(
        selector_name: impl Into<String>,
        strategy_used: impl Into<String>,
        reason: impl Into<String>,
        resolution_time_ms: f64,
        validation_results: Vec<ValidationResult>,
    ) -> Self {
        Self {
            selector_name: selector_name.into(),
            strategy_used: strategy_used.into(),
            element_info: None,
            confidence_score: 0.0,
            resolution_time_ms,
            validation_results,
            success: false,
            timestamp: Utc::now(),
            failure_reason: Some(reason.into()),
        }
    }

    /// Invariant checked in property tests (§8.1): `success XOR
    /// failure_reason`, `success => element_info present`.
    pub fn is_well_formed(&self) -> bool {
        self.success == self.element_info.is_some()
            && self.success == self.failure_reason.is_none()
            && (0.0..=1.0).contains(&self.confidence_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyConfig;

    fn text_anchor(priority: u32) -> StrategyPattern {
        StrategyPattern::new(
            format!("p{priority}"),
            priority,
            StrategyConfig::TextAnchor {
                anchor_text: "Manchester United".into(),
                proximity_selector: None,
                case_sensitive: false,
            },
        )
    }

    #[test]
    fn rejects_duplicate_priorities() {
        let err = SemanticSelector::new(
            "home_team_name",
            "",
            "production",
            vec![text_anchor(1), text_anchor(1)],
            vec![],
            0.8,
        )
        .unwrap_err();
        assert_eq!(err, SelectorDefinitionError::DuplicatePriority(1));
    }

    #[test]
    fn rejects_zero_priority() {
        let err = SemanticSelector::new(
            "home_team_name",
            "",
            "production",
            vec![text_anchor(0)],
            vec![],
            0.8,
        )
        .unwrap_err();
        assert_eq!(err, SelectorDefinitionError::ZeroPriority);
    }

    #[test]
    fn sorts_strategies_by_priority() {
        let selector = SemanticSelector::new(
            "home_team_name",
            "",
            "production",
            vec![text_anchor(2), text_anchor(1)],
            vec![],
            0.8,
        )
        .unwrap();
        assert_eq!(selector.strategies[0].priority, 1);
        assert_eq!(selector.strategies[1].priority, 2);
    }

    #[test]
    fn cold_start_clamps_to_half() {
        let pattern = text_anchor(1);
        assert_eq!(pattern.cold_start_clamped_success_rate(), 0.5);
    }

    #[test]
    fn poor_track_record_is_not_floored_after_cold_start() {
        let mut pattern = text_anchor(1);
        for _ in 0..20 {
            pattern.record_attempt(false, 10.0);
        }
        assert!(pattern.success_rate < 0.1);
        assert_eq!(
            pattern.cold_start_clamped_success_rate(),
            pattern.success_rate
        );
    }

    #[test]
    fn required_rule_needs_positive_weight() {
        let err =
            ValidationRule::new(ValidationRuleType::Regex, "^[A-Za-z ]+$", true, 0.0).unwrap_err();
        assert_eq!(err, ValidationRuleError::RequiredRuleHasZeroWeight);
    }
}
