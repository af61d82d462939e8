//! Strategy Kernel: the four strategy variants, each an async function over
//! `(config, &dyn DocumentDriver) -> AttemptOutcome`. Strategies never touch
//! telemetry, metrics, or validation — the Resolution Engine composes those
//! around an attempt's outcome.

mod attribute_match;
mod dom_relationship;
mod role_based;
mod text_anchor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use dom_relationship::RelationshipType;

use crate::driver::{DocumentDriver, DriverError};
use crate::model::{ElementInfo, StrategyType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Match(ElementInfo),
    NoMatch { reason: String },
}

impl AttemptOutcome {
    pub fn no_match(reason: impl Into<String>) -> Self {
        AttemptOutcome::NoMatch {
            reason: reason.into(),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, AttemptOutcome::Match(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyConfigError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("{field} is not a valid regular expression: {message}")]
    InvalidRegex { field: &'static str, message: String },
    #[error("unknown relationship type: {0}")]
    UnknownRelationshipType(String),
    #[error("child_index is required when relationship_type is child")]
    MissingChildIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "strategy_type", rename_all = "snake_case")]
pub enum StrategyConfig {
    TextAnchor {
        anchor_text: String,
        proximity_selector: Option<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    AttributeMatch {
        attribute: String,
        value_pattern: String,
        element_tag: Option<String>,
    },
    DomRelationship {
        parent_selector: String,
        relationship_type: RelationshipType,
        child_index: Option<usize>,
        element_tag: Option<String>,
        /// For `Sibling`: the anchor whose first sibling of `element_tag`
        /// within `parent_selector` is returned. `None` falls back to the
        /// first child matching `element_tag`.
        #[serde(default)]
        anchor: Option<String>,
    },
    RoleBased {
        role: String,
        semantic_attribute: Option<String>,
        expected_value: Option<String>,
    },
}

impl StrategyConfig {
    pub fn strategy_type(&self) -> StrategyType {
        match self {
            StrategyConfig::TextAnchor { .. } => StrategyType::TextAnchor,
            StrategyConfig::AttributeMatch { .. } => StrategyType::AttributeMatch,
            StrategyConfig::DomRelationship { .. } => StrategyType::DomRelationship,
            StrategyConfig::RoleBased { .. } => StrategyType::RoleBased,
        }
    }

    /// Pure validation; an empty return means the config is well-formed
    /// enough to be used during resolution.
    pub fn validate_config(&self) -> Vec<StrategyConfigError> {
        match self {
            StrategyConfig::TextAnchor { anchor_text, .. } => {
                text_anchor::validate_config(anchor_text)
            }
            StrategyConfig::AttributeMatch {
                attribute,
                value_pattern,
                ..
            } => attribute_match::validate_config(attribute, value_pattern),
            StrategyConfig::DomRelationship {
                parent_selector,
                relationship_type,
                child_index,
                ..
            } => dom_relationship::validate_config(parent_selector, *relationship_type, *child_index),
            StrategyConfig::RoleBased { role, .. } => role_based::validate_config(role),
        }
    }

    pub async fn attempt(
        &self,
        driver: &dyn DocumentDriver,
    ) -> Result<AttemptOutcome, DriverError> {
        match self {
            StrategyConfig::TextAnchor {
                anchor_text,
                proximity_selector,
                case_sensitive,
            } => {
                text_anchor::attempt(
                    driver,
                    anchor_text,
                    proximity_selector.as_deref(),
                    *case_sensitive,
                )
                .await
            }
            StrategyConfig::AttributeMatch {
                attribute,
                value_pattern,
                element_tag,
            } => attribute_match::attempt(driver, attribute, value_pattern, element_tag.as_deref()).await,
            StrategyConfig::DomRelationship {
                parent_selector,
                relationship_type,
                child_index,
                element_tag,
                anchor,
            } => {
                dom_relationship::attempt(
                    driver,
                    parent_selector,
                    *relationship_type,
                    *child_index,
                    element_tag.as_deref(),
                    anchor.as_deref(),
                )
                .await
            }
            StrategyConfig::RoleBased {
                role,
                semantic_attribute,
                expected_value,
            } => {
                role_based::attempt(
                    driver,
                    role,
                    semantic_attribute.as_deref(),
                    expected_value.as_deref(),
                )
                .await
            }
        }
    }
}
