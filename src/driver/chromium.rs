//! Chromium-backed `DocumentDriver` (feature `chromium-driver`), grounded
//! on the teacher's `browser::automation`/`browser::metadata` use of
//! `chromiumoxide`: a single JS snippet does the DOM inspection and the
//! page hands back typed JSON via `Page::evaluate(..).into_value()`,
//! rather than walking chromiumoxide's own element handles.

use std::collections::HashMap;

use async_trait::async_trait;
use chromiumoxide::page::Page;
use serde::Deserialize;

use super::{DocumentDriver, DriverError, DriverResult, Element};

#[derive(Debug, Deserialize)]
struct RawElement {
    tag_name: String,
    text_content: String,
    attributes: HashMap<String, String>,
    class_tokens: Vec<String>,
    dom_path: String,
    visibility: bool,
    interactable: bool,
}

impl From<RawElement> for Element {
    fn from(raw: RawElement) -> Self {
        Element {
            tag_name: raw.tag_name,
            text_content: raw.text_content,
            attributes: raw.attributes,
            class_tokens: raw.class_tokens,
            dom_path: raw.dom_path,
            visibility: raw.visibility,
            interactable: raw.interactable,
        }
    }
}

/// Wraps a live `chromiumoxide::Page`. Structural expressions (§4.2's mini
/// query language) pass straight through to `document.querySelectorAll`
/// since the grammar this crate accepts is a strict subset of CSS.
pub struct ChromiumDriver {
    page: Page,
}

impl ChromiumDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    fn inspect_script(expr: &str, all: bool) -> String {
        let method = if all { "querySelectorAll" } else { "querySelector" };
        format!(
            r#"(() => {{
                function describe(el) {{
                    if (!el) return null;
                    const rect = el.getBoundingClientRect();
                    const style = window.getComputedStyle(el);
                    const attributes = {{}};
                    for (const attr of el.attributes) {{ attributes[attr.name] = attr.value; }}
                    let path = [];
                    let node = el;
                    while (node && node.nodeType === 1) {{
                        let index = 1;
                        let sibling = node.previousElementSibling;
                        while (sibling) {{
                            if (sibling.tagName === node.tagName) index += 1;
                            sibling = sibling.previousElementSibling;
                        }}
                        path.unshift(`${{node.tagName.toLowerCase()}}[${{index - 1}}]`);
                        node = node.parentElement;
                    }}
                    return {{
                        tag_name: el.tagName.toLowerCase(),
                        text_content: (el.textContent || '').trim(),
                        attributes,
                        class_tokens: Array.from(el.classList),
                        dom_path: '/' + path.join('/'),
                        visibility: style.visibility !== 'hidden' && style.display !== 'none' && rect.width > 0 && rect.height > 0,
                        interactable: !el.disabled && style.pointerEvents !== 'none',
                    }};
                }}
                const selector = {expr:?};
                const nodes = document.{method}(selector);
                return {result};
            }})()"#,
            expr = expr,
            method = method,
            result = if all {
                "Array.from(nodes).map(describe)"
            } else {
                "describe(nodes)"
            },
        )
    }
}

#[async_trait]
impl DocumentDriver for ChromiumDriver {
    async fn query_one(&self, expr: &str) -> DriverResult<Option<Element>> {
        let raw: Option<RawElement> = self
            .page
            .evaluate(Self::inspect_script(expr, false))
            .await
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))?
            .into_value()
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))?;
        Ok(raw.map(Element::from))
    }

    async fn query_all(&self, expr: &str) -> DriverResult<Vec<Element>> {
        let raw: Vec<RawElement> = self
            .page
            .evaluate(Self::inspect_script(expr, true))
            .await
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))?
            .into_value()
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))?;
        Ok(raw.into_iter().map(Element::from).collect())
    }

    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value> {
        self.page
            .evaluate(script)
            .await
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))?
            .into_value()
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.page
            .evaluate("window.location.href")
            .await
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))?
            .into_value()
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))
    }

    async fn current_title(&self) -> DriverResult<String> {
        self.page
            .evaluate("document.title")
            .await
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))?
            .into_value()
            .map_err(|err| DriverError::EvaluationFailed(err.to_string()))
    }
}
