use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::Regex;

use crate::model::{ValidationResult, ValidationRule, ValidationRuleType};

fn cache() -> &'static Mutex<HashMap<String, Regex>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn compiled(pattern: &str) -> Option<Regex> {
    let mut cache = cache().lock().unwrap();
    if let Some(re) = cache.get(pattern) {
        return Some(re.clone());
    }
    let re = Regex::new(pattern).ok()?;
    cache.insert(pattern.to_string(), re.clone());
    Some(re)
}

pub(super) fn validate(text: &str, rule: &ValidationRule) -> ValidationResult {
    let trimmed = text.trim();
    let full_match = compiled(&rule.pattern)
        .map(|re| {
            re.find(trimmed)
                .is_some_and(|m| m.start() == 0 && m.end() == trimmed.len())
        })
        .unwrap_or(false);

    let (passed, score, message) = if full_match {
        (true, rule.weight, "full match".to_string())
    } else {
        (
            false,
            0.0,
            format!("`{trimmed}` does not fully match `{}`", rule.pattern),
        )
    };

    ValidationResult {
        rule_type: ValidationRuleType::Regex,
        passed,
        score,
        message,
        weight: rule.weight,
        details: HashMap::new(),
    }
}
