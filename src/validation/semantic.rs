use std::collections::HashMap;

use regex::Regex;
use std::sync::OnceLock;

use crate::model::{ValidationResult, ValidationRule, ValidationRuleType};

const TEAM_INDICATORS: &[&str] = &[
    "FC", "United", "City", "Athletic", "Town", "Rovers", "Albion", "Wanderers", "Hotspur",
];
const MATCH_STATUSES: &[&str] = &[
    "live", "finished", "upcoming", "postponed", "cancelled", "half time", "full time",
];
const POSITIONS: &[&str] = &[
    "goalkeeper", "defender", "midfielder", "forward", "striker", "winger", "centre-back",
    "full-back",
];
const TOURNAMENT_STAGES: &[&str] = &[
    "group stage",
    "round of 16",
    "quarter-final",
    "semi-final",
    "final",
];

fn name_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z .'\-]*$").unwrap())
}

fn score_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}\s*[-:\u{2013}]\s*\d{1,2}$").unwrap())
}

fn time_period_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(1st|2nd) Half$|^Extra Time$|^Penalties$|^\d{1,3}(\+\d{1,2})?'$").unwrap()
    })
}

fn venue_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 .'&\-]{2,80}$").unwrap())
}

/// Returns `(passed, fraction_of_weight)`; `None` for an unrecognized tag.
fn score(tag: &str, trimmed: &str) -> Option<(bool, f64)> {
    match tag {
        "team_name" => {
            if !name_shape().is_match(trimmed) {
                return Some((false, 0.0));
            }
            let has_indicator = TEAM_INDICATORS.iter().any(|i| trimmed.contains(i));
            Some((true, if has_indicator { 1.0 } else { 0.8 }))
        }
        "score" => Some((score_shape().is_match(trimmed), 1.0)),
        "match_status" => {
            let lower = trimmed.to_ascii_lowercase();
            Some((MATCH_STATUSES.contains(&lower.as_str()), 1.0))
        }
        "time_period" => Some((time_period_shape().is_match(trimmed), 1.0)),
        "position" => {
            let lower = trimmed.to_ascii_lowercase();
            Some((POSITIONS.iter().any(|p| lower == *p), 1.0))
        }
        "player_name" => {
            if !name_shape().is_match(trimmed) {
                return Some((false, 0.0));
            }
            let word_count = trimmed.split_whitespace().count();
            Some((true, if word_count >= 2 { 1.0 } else { 0.6 }))
        }
        "tournament_stage" => {
            let lower = trimmed.to_ascii_lowercase();
            Some((TOURNAMENT_STAGES.iter().any(|s| lower == *s), 1.0))
        }
        "venue" => Some((venue_shape().is_match(trimmed), 1.0)),
        _ => None,
    }
}

pub(super) fn validate(text: &str, rule: &ValidationRule) -> ValidationResult {
    let trimmed = text.trim();
    let (passed, fraction, message) = match score(&rule.pattern, trimmed) {
        Some((true, fraction)) => (true, fraction, "matched semantic tag".to_string()),
        Some((false, _)) => (false, 0.0, format!("`{trimmed}` does not match `{}`", rule.pattern)),
        None => (false, 0.0, format!("unknown semantic tag `{}`", rule.pattern)),
    };
    ValidationResult {
        rule_type: ValidationRuleType::Semantic,
        passed,
        score: if passed { rule.weight * fraction } else { 0.0 },
        message,
        weight: rule.weight,
        details: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_name_without_indicator_scores_partial() {
        let rule = ValidationRule::new(ValidationRuleType::Semantic, "team_name", false, 0.5).unwrap();
        let result = validate("Barcelona", &rule);
        assert!(result.passed);
        assert_eq!(result.score, 0.4);
    }

    #[test]
    fn team_name_with_indicator_scores_full() {
        let rule = ValidationRule::new(ValidationRuleType::Semantic, "team_name", false, 0.5).unwrap();
        let result = validate("Manchester United", &rule);
        assert_eq!(result.score, 0.5);
    }
}
