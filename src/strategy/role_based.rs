use crate::driver::{DocumentDriver, DriverError, Element};

use super::{AttemptOutcome, StrategyConfigError};

pub(super) fn validate_config(role: &str) -> Vec<StrategyConfigError> {
    let mut errors = Vec::new();
    if role.is_empty() {
        errors.push(StrategyConfigError::EmptyField { field: "role" });
    }
    errors
}

/// Implicit ARIA role per tag, for the common tags this engine is expected
/// to encounter. Elements with an explicit `role` attribute always take
/// that value instead.
fn implicit_role(element: &Element) -> Option<&'static str> {
    match element.tag_name.as_str() {
        "button" => Some("button"),
        "a" if element.attributes.contains_key("href") => Some("link"),
        "nav" => Some("navigation"),
        "header" => Some("banner"),
        "footer" => Some("contentinfo"),
        "main" => Some("main"),
        "table" => Some("table"),
        "ul" | "ol" => Some("list"),
        "li" => Some("listitem"),
        "img" => Some("img"),
        "input" => Some("textbox"),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading"),
        _ => None,
    }
}

fn effective_role(element: &Element) -> Option<String> {
    element
        .attributes
        .get("role")
        .cloned()
        .or_else(|| implicit_role(element).map(str::to_string))
}

fn satisfies(element: &Element, role: &str, semantic_attribute: Option<&str>, expected_value: Option<&str>) -> bool {
    if effective_role(element).as_deref() != Some(role) {
        return false;
    }
    match (semantic_attribute, expected_value) {
        (Some(attr), Some(expected)) => element.attributes.get(attr).map(String::as_str) == Some(expected),
        _ => true,
    }
}

pub(super) async fn attempt(
    driver: &dyn DocumentDriver,
    role: &str,
    semantic_attribute: Option<&str>,
    expected_value: Option<&str>,
) -> Result<AttemptOutcome, DriverError> {
    let all = driver.query_all("*").await?;
    match all
        .into_iter()
        .find(|el| satisfies(el, role, semantic_attribute, expected_value))
    {
        Some(el) => Ok(AttemptOutcome::Match(el.to_element_info())),
        None => Ok(AttemptOutcome::no_match("role_not_found")),
    }
}
