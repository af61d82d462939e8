use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{ValidationResult, ValidationRule, ValidationRuleType};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p"];

fn is_boolean(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "1" | "0"
    )
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn is_phone(text: &str) -> bool {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    let allowed_chars = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    allowed_chars && (7..=15).contains(&digits.len())
}

fn is_date(text: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(text, fmt).is_ok())
}

fn is_time(text: &str) -> bool {
    TIME_FORMATS
        .iter()
        .any(|fmt| chrono::NaiveTime::parse_from_str(text, fmt).is_ok())
}

fn accepts(tag: &str, trimmed: &str) -> Option<bool> {
    match tag {
        "float" => Some(trimmed.parse::<f64>().is_ok()),
        "int" => Some(trimmed.parse::<i64>().is_ok()),
        "string" => Some(!trimmed.is_empty()),
        "boolean" => Some(is_boolean(trimmed)),
        "email" => Some(is_email(trimmed)),
        "url" => Some(url::Url::parse(trimmed).is_ok()),
        "phone" => Some(is_phone(trimmed)),
        "date" => Some(is_date(trimmed)),
        "time" => Some(is_time(trimmed)),
        _ => None,
    }
}

pub(super) fn validate(text: &str, rule: &ValidationRule) -> ValidationResult {
    let trimmed = text.trim();
    let (passed, message) = match accepts(&rule.pattern, trimmed) {
        Some(true) => (true, "matched data type".to_string()),
        Some(false) => (false, format!("`{trimmed}` is not a valid {}", rule.pattern)),
        None => (false, format!("unknown data type tag `{}`", rule.pattern)),
    };
    ValidationResult {
        rule_type: ValidationRuleType::DataType,
        passed,
        score: if passed { rule.weight } else { 0.0 },
        message,
        weight: rule.weight,
        details: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_fails() {
        let rule = ValidationRule::new(ValidationRuleType::DataType, "currency", false, 0.3).unwrap();
        assert!(!validate("42", &rule).passed);
    }

    #[test]
    fn recognizes_iso_date() {
        let rule = ValidationRule::new(ValidationRuleType::DataType, "date", false, 0.3).unwrap();
        assert!(validate("2026-07-27", &rule).passed);
    }

    #[test]
    fn recognizes_email() {
        let rule = ValidationRule::new(ValidationRuleType::DataType, "email", false, 0.3).unwrap();
        assert!(validate("ops@example.com", &rule).passed);
        assert!(!validate("not-an-email", &rule).passed);
    }
}
