use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{ValidationResult, ValidationRule, ValidationRuleType};

/// A named validator pluggable into the registry consulted by
/// `ValidationRuleType::Custom` rules. `args` is whatever trails the
/// validator name after `:` in `ValidationRule.pattern`.
pub trait CustomValidator: Send + Sync {
    fn validate(&self, text: &str, args: &str) -> (bool, String);
}

fn parse_args(args: &str) -> HashMap<&str, &str> {
    args.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

pub struct LengthValidator;

impl CustomValidator for LengthValidator {
    fn validate(&self, text: &str, args: &str) -> (bool, String) {
        let bounds = parse_args(args);
        let len = text.trim().chars().count();
        let min: usize = bounds.get("min").and_then(|v| v.parse().ok()).unwrap_or(0);
        let max: usize = bounds
            .get("max")
            .and_then(|v| v.parse().ok())
            .unwrap_or(usize::MAX);
        if len < min || len > max {
            (false, format!("length {len} outside [{min},{max}]"))
        } else {
            (true, "length within bounds".to_string())
        }
    }
}

pub struct RangeValidator;

impl CustomValidator for RangeValidator {
    fn validate(&self, text: &str, args: &str) -> (bool, String) {
        let bounds = parse_args(args);
        let Ok(value) = text.trim().parse::<f64>() else {
            return (false, format!("`{}` is not numeric", text.trim()));
        };
        let min: f64 = bounds
            .get("min")
            .and_then(|v| v.parse().ok())
            .unwrap_or(f64::NEG_INFINITY);
        let max: f64 = bounds
            .get("max")
            .and_then(|v| v.parse().ok())
            .unwrap_or(f64::INFINITY);
        if value < min || value > max {
            (false, format!("{value} outside [{min},{max}]"))
        } else {
            (true, "value within bounds".to_string())
        }
    }
}

pub(super) fn validate(
    text: &str,
    rule: &ValidationRule,
    table: &HashMap<String, Arc<dyn CustomValidator>>,
) -> ValidationResult {
    let (name, args) = rule.pattern.split_once(':').unwrap_or((&rule.pattern, ""));
    let (passed, message) = match table.get(name) {
        Some(validator) => validator.validate(text, args),
        None => (false, format!("unknown custom validator `{name}`")),
    };
    ValidationResult {
        rule_type: ValidationRuleType::Custom,
        passed,
        score: if passed { rule.weight } else { 0.0 },
        message,
        weight: rule.weight,
        details: HashMap::new(),
    }
}
