//! Document Driver interface: the capability set strategies use to read a
//! live (or fake) document. Never implemented by this crate for production
//! use beyond the `chromium-driver` feature; consumers may supply their own.

mod memory;
#[cfg(feature = "chromium-driver")]
mod chromium;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{InMemoryDocument, InMemoryDriver, InMemoryNode};
#[cfg(feature = "chromium-driver")]
pub use chromium::ChromiumDriver;

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("document is gone")]
    DocumentGone,
    #[error("script evaluation failed: {0}")]
    EvaluationFailed(String),
    #[error("invalid structural expression: {0}")]
    InvalidExpression(String),
    #[error("driver operation timed out")]
    Timeout,
    #[error("underlying driver error: {0}")]
    Backend(String),
}

/// Read-only snapshot of a matched node, as exposed by the driver.
/// Distinct from `crate::model::ElementInfo`: this is what the driver hands
/// back; strategies translate it into the richer `ElementInfo` that flows
/// into a `SelectorResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub tag_name: String,
    pub text_content: String,
    pub attributes: HashMap<String, String>,
    pub class_tokens: Vec<String>,
    pub dom_path: String,
    pub visibility: bool,
    pub interactable: bool,
}

impl Element {
    pub fn to_element_info(&self) -> crate::model::ElementInfo {
        crate::model::ElementInfo {
            tag_name: self.tag_name.clone(),
            text_content: self.text_content.clone(),
            attributes: self.attributes.clone(),
            css_classes: self.class_tokens.clone(),
            dom_path: self.dom_path.clone(),
            visibility: self.visibility,
            interactable: self.interactable,
        }
    }
}

/// The capability set strategies are allowed to depend on. Concrete
/// drivers (a real browser, an in-memory tree for tests) both satisfy it;
/// this replaces duck-typing a page object with a narrow trait boundary.
#[async_trait]
pub trait DocumentDriver: Send + Sync {
    async fn query_one(&self, expr: &str) -> DriverResult<Option<Element>>;
    async fn query_all(&self, expr: &str) -> DriverResult<Vec<Element>>;
    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value>;
    async fn current_url(&self) -> DriverResult<String>;
    async fn current_title(&self) -> DriverResult<String>;
}
