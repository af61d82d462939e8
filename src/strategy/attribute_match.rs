use regex::Regex;

use crate::driver::{DocumentDriver, DriverError, Element};

use super::{AttemptOutcome, StrategyConfigError};

pub(super) fn validate_config(attribute: &str, value_pattern: &str) -> Vec<StrategyConfigError> {
    let mut errors = Vec::new();
    if attribute.is_empty() {
        errors.push(StrategyConfigError::EmptyField { field: "attribute" });
    }
    if value_pattern.is_empty() {
        errors.push(StrategyConfigError::EmptyField {
            field: "value_pattern",
        });
    } else if let Err(err) = Regex::new(value_pattern) {
        errors.push(StrategyConfigError::InvalidRegex {
            field: "value_pattern",
            message: err.to_string(),
        });
    }
    errors
}

/// Whole-string match against `value_pattern`, mirroring
/// `validation::regex_validator`'s full-match rule: a partial/substring hit
/// does not count as the attribute value matching the pattern.
fn fully_matches(regex: &Regex, value: &str) -> bool {
    regex
        .find(value)
        .is_some_and(|m| m.start() == 0 && m.end() == value.len())
}

fn attribute_matches(element: &Element, attribute: &str, regex: &Regex) -> bool {
    if attribute == "class" {
        return element.class_tokens.iter().any(|token| fully_matches(regex, token));
    }
    element
        .attributes
        .get(attribute)
        .is_some_and(|value| fully_matches(regex, value))
}

pub(super) async fn attempt(
    driver: &dyn DocumentDriver,
    attribute: &str,
    value_pattern: &str,
    element_tag: Option<&str>,
) -> Result<AttemptOutcome, DriverError> {
    let regex = Regex::new(value_pattern)
        .map_err(|err| DriverError::InvalidExpression(err.to_string()))?;
    let expr = element_tag.unwrap_or("*");
    let candidates = driver.query_all(expr).await?;
    match candidates
        .into_iter()
        .find(|el| attribute_matches(el, attribute, &regex))
    {
        Some(el) => Ok(AttemptOutcome::Match(el.to_element_info())),
        None => Ok(AttemptOutcome::no_match("attribute_not_found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{InMemoryDocument, InMemoryDriver, InMemoryNode};

    #[tokio::test]
    async fn matches_by_class_token() {
        let driver = InMemoryDriver::new(InMemoryDocument::new(
            InMemoryNode::new("span", "Manchester United").with_class("team-name"),
            "https://example.test",
            "title",
        ));
        let outcome = attempt(&driver, "class", "^team-.*$", Some("span"))
            .await
            .unwrap();
        assert!(outcome.is_match());
    }

    #[tokio::test]
    async fn partial_attribute_match_is_rejected() {
        let node = InMemoryNode::new("a", "Standings").with_attr("data-testid", "team-name-extra");
        let driver = InMemoryDriver::new(InMemoryDocument::new(node, "https://example.test", "title"));
        let outcome = attempt(&driver, "data-testid", "^team-name$", Some("a"))
            .await
            .unwrap();
        assert!(!outcome.is_match());
    }

    #[tokio::test]
    async fn no_match_when_attribute_absent() {
        let driver = InMemoryDriver::new(InMemoryDocument::new(
            InMemoryNode::new("span", "Manchester United"),
            "https://example.test",
            "title",
        ));
        let outcome = attempt(&driver, "data-testid", ".+", None).await.unwrap();
        assert!(!outcome.is_match());
    }
}
