use serde::{Deserialize, Serialize};

use crate::driver::{DocumentDriver, DriverError};

use super::{AttemptOutcome, StrategyConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Child,
    Descendant,
    Sibling,
}

pub(super) fn validate_config(
    parent_selector: &str,
    relationship_type: RelationshipType,
    child_index: Option<usize>,
) -> Vec<StrategyConfigError> {
    let mut errors = Vec::new();
    if parent_selector.is_empty() {
        errors.push(StrategyConfigError::EmptyField {
            field: "parent_selector",
        });
    }
    if relationship_type == RelationshipType::Child && child_index.is_none() {
        errors.push(StrategyConfigError::MissingChildIndex);
    }
    errors
}

pub(super) async fn attempt(
    driver: &dyn DocumentDriver,
    parent_selector: &str,
    relationship_type: RelationshipType,
    child_index: Option<usize>,
    element_tag: Option<&str>,
    anchor: Option<&str>,
) -> Result<AttemptOutcome, DriverError> {
    if driver.query_one(parent_selector).await?.is_none() {
        return Ok(AttemptOutcome::no_match("parent_not_found"));
    }

    match relationship_type {
        RelationshipType::Child => {
            let Some(index) = child_index else {
                return Ok(AttemptOutcome::no_match("index_out_of_range"));
            };
            let children = driver
                .query_all(&format!("{parent_selector} > *"))
                .await?;
            match children.into_iter().nth(index) {
                Some(el) => Ok(AttemptOutcome::Match(el.to_element_info())),
                None => Ok(AttemptOutcome::no_match("index_out_of_range")),
            }
        }
        RelationshipType::Descendant => {
            let tag = element_tag.unwrap_or("*");
            let matches = driver
                .query_all(&format!("{parent_selector} {tag}"))
                .await?;
            match matches.into_iter().next() {
                Some(el) => Ok(AttemptOutcome::Match(el.to_element_info())),
                None => Ok(AttemptOutcome::no_match("descendant_not_found")),
            }
        }
        RelationshipType::Sibling => {
            let tag = element_tag.unwrap_or("*");
            let candidates = driver
                .query_all(&format!("{parent_selector} > {tag}"))
                .await?;
            // With an anchor given, the first *other* child of `tag` within
            // the parent is the anchor's sibling; no anchor falls back to
            // simply the first child matching `tag`.
            let anchor_path = match anchor {
                Some(anchor) => driver
                    .query_one(&format!("{parent_selector} {anchor}"))
                    .await?
                    .map(|el| el.dom_path),
                None => None,
            };
            let found = candidates
                .into_iter()
                .find(|el| anchor_path.as_deref() != Some(el.dom_path.as_str()));
            match found {
                Some(el) => Ok(AttemptOutcome::Match(el.to_element_info())),
                None => Ok(AttemptOutcome::no_match("sibling_not_found")),
            }
        }
    }
}
