//! Validation Kernel: side-effect-free validators consuming `(text, rule)`
//! pairs and producing scored `ValidationResult`s.

mod custom;
mod data_type;
mod regex_validator;
mod semantic;

use std::collections::HashMap;
use std::sync::Arc;

pub use custom::CustomValidator;

use crate::model::{ValidationResult, ValidationRule, ValidationRuleType};

/// Runs every rule for a selector against a candidate's text. Holds the
/// custom-validator lookup table; everything else here is a pure function.
pub struct ValidationEngine {
    custom_validators: HashMap<String, Arc<dyn CustomValidator>>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        let mut custom_validators: HashMap<String, Arc<dyn CustomValidator>> = HashMap::new();
        custom_validators.insert("length".to_string(), Arc::new(custom::LengthValidator));
        custom_validators.insert("range".to_string(), Arc::new(custom::RangeValidator));
        Self { custom_validators }
    }
}

impl ValidationEngine {
    pub fn register_custom(&mut self, name: impl Into<String>, validator: Arc<dyn CustomValidator>) {
        self.custom_validators.insert(name.into(), validator);
    }

    pub fn validate_all(&self, text: &str, rules: &[ValidationRule]) -> Vec<ValidationResult> {
        rules.iter().map(|rule| self.validate_one(text, rule)).collect()
    }

    fn validate_one(&self, text: &str, rule: &ValidationRule) -> ValidationResult {
        match rule.rule_type {
            ValidationRuleType::Regex => regex_validator::validate(text, rule),
            ValidationRuleType::DataType => data_type::validate(text, rule),
            ValidationRuleType::Semantic => semantic::validate(text, rule),
            ValidationRuleType::Custom => custom::validate(text, rule, &self.custom_validators),
        }
    }

    /// Weighted mean of rule scores. A selector with no validation rules
    /// contributes full marks rather than zero.
    pub fn aggregate_score(results: &[ValidationResult]) -> f64 {
        if results.is_empty() {
            return 1.0;
        }
        let total_weight: f64 = results.iter().map(|r| r.weight).sum();
        if total_weight <= 0.0 {
            return 0.0;
        }
        results.iter().map(|r| r.score).sum::<f64>() / total_weight
    }
}
