//! A fake, in-memory document tree satisfying `DocumentDriver`, used by unit
//! and integration tests in place of a real browser.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{DocumentDriver, DriverError, DriverResult, Element};

#[derive(Debug, Clone)]
pub struct InMemoryNode {
    pub tag_name: String,
    pub text_content: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<InMemoryNode>,
    pub visible: bool,
    pub interactable: bool,
    path: String,
}

impl InMemoryNode {
    pub fn new(tag_name: impl Into<String>, text_content: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            text_content: text_content.into(),
            attributes: HashMap::new(),
            children: Vec::new(),
            visible: true,
            interactable: true,
            path: String::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let entry = self.attributes.entry("class".to_string()).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(&class.into());
        self
    }

    pub fn with_child(mut self, child: InMemoryNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn non_interactable(mut self) -> Self {
        self.interactable = false;
        self
    }

    fn class_tokens(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .into_iter()
            .flat_map(|c| c.split_whitespace())
    }

    fn assign_paths(&mut self, own_path: &str) {
        self.path = own_path.to_string();
        let mut seen_tags: HashMap<String, usize> = HashMap::new();
        for child in &mut self.children {
            let index = seen_tags.entry(child.tag_name.clone()).or_insert(0);
            let child_path = format!("{own_path}/{}[{}]", child.tag_name, *index);
            *index += 1;
            child.assign_paths(&child_path);
        }
    }
}

pub struct InMemoryDocument {
    root: InMemoryNode,
    url: String,
    title: String,
}

impl InMemoryDocument {
    pub fn new(mut root: InMemoryNode, url: impl Into<String>, title: impl Into<String>) -> Self {
        let root_path = format!("/{}[0]", root.tag_name);
        root.assign_paths(&root_path);
        Self {
            root,
            url: url.into(),
            title: title.into(),
        }
    }
}

/// Satisfies `DocumentDriver` over a fixed, in-memory tree. Structural
/// expressions support a small CSS-like grammar: tag names, `.class`,
/// `[attr]`/`[attr=value]`, `*`, the descendant combinator (whitespace), and
/// the direct-child combinator (`>`).
pub struct InMemoryDriver {
    document: InMemoryDocument,
}

impl InMemoryDriver {
    pub fn new(document: InMemoryDocument) -> Self {
        Self { document }
    }

    fn to_element(node: &InMemoryNode) -> Element {
        Element {
            tag_name: node.tag_name.clone(),
            text_content: node.text_content.clone(),
            attributes: node.attributes.clone(),
            class_tokens: node.class_tokens().map(String::from).collect(),
            dom_path: node.path.clone(),
            visibility: node.visible,
            interactable: node.interactable,
        }
    }

    fn evaluate_steps<'a>(&'a self, steps: &[Step]) -> Vec<&'a InMemoryNode> {
        let mut scope: Vec<&InMemoryNode> = vec![&self.document.root];
        for step in steps {
            scope = match step.combinator {
                None => Self::descendants_or_self(&scope, &step.selector),
                Some(Combinator::Child) => Self::children_of(&scope, &step.selector),
                Some(Combinator::Descendant) => Self::descendants_of(&scope, &step.selector),
            };
        }
        scope
    }

    fn descendants_or_self<'a>(
        scope: &[&'a InMemoryNode],
        sel: &SimpleSelector,
    ) -> Vec<&'a InMemoryNode> {
        let mut out = Vec::new();
        for node in scope {
            Self::collect_self_and_descendants(node, sel, &mut out);
        }
        out
    }

    fn collect_self_and_descendants<'a>(
        node: &'a InMemoryNode,
        sel: &SimpleSelector,
        out: &mut Vec<&'a InMemoryNode>,
    ) {
        if sel.matches(node) {
            out.push(node);
        }
        for child in &node.children {
            Self::collect_self_and_descendants(child, sel, out);
        }
    }

    fn children_of<'a>(scope: &[&'a InMemoryNode], sel: &SimpleSelector) -> Vec<&'a InMemoryNode> {
        let mut out = Vec::new();
        for node in scope {
            for child in &node.children {
                if sel.matches(child) {
                    out.push(child);
                }
            }
        }
        out
    }

    fn descendants_of<'a>(
        scope: &[&'a InMemoryNode],
        sel: &SimpleSelector,
    ) -> Vec<&'a InMemoryNode> {
        let mut out = Vec::new();
        for node in scope {
            for child in &node.children {
                Self::collect_self_and_descendants(child, sel, &mut out);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
enum Combinator {
    Child,
    Descendant,
}

#[derive(Debug, Clone)]
struct SimpleSelector {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl SimpleSelector {
    fn matches(&self, node: &InMemoryNode) -> bool {
        if let Some(tag) = &self.tag {
            if &node.tag_name != tag {
                return false;
            }
        }
        for class in &self.classes {
            if !node.class_tokens().any(|c| c == class) {
                return false;
            }
        }
        for (key, expected) in &self.attrs {
            match node.attributes.get(key) {
                None => return false,
                Some(actual) => {
                    if let Some(expected) = expected {
                        if actual != expected {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
struct Step {
    combinator: Option<Combinator>,
    selector: SimpleSelector,
}

fn parse_simple_selector(token: &str) -> DriverResult<SimpleSelector> {
    if token.is_empty() {
        return Err(DriverError::InvalidExpression("empty selector".to_string()));
    }
    let mut tag = None;
    let mut classes = Vec::new();
    let mut attrs = Vec::new();

    let tag_end = token.find(['.', '[']).unwrap_or(token.len());
    let tag_part = &token[..tag_end];
    if !tag_part.is_empty() && tag_part != "*" {
        tag = Some(tag_part.to_string());
    }
    let mut rest = &token[tag_end..];
    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('.') {
            let end = stripped.find(['.', '[']).unwrap_or(stripped.len());
            if end == 0 {
                return Err(DriverError::InvalidExpression(token.to_string()));
            }
            classes.push(stripped[..end].to_string());
            rest = &stripped[end..];
        } else if let Some(stripped) = rest.strip_prefix('[') {
            let end = stripped
                .find(']')
                .ok_or_else(|| DriverError::InvalidExpression(token.to_string()))?;
            let body = &stripped[..end];
            if let Some(eq_pos) = body.find('=') {
                let key = &body[..eq_pos];
                let value = body[eq_pos + 1..].trim_matches('"');
                attrs.push((key.to_string(), Some(value.to_string())));
            } else {
                attrs.push((body.to_string(), None));
            }
            rest = &stripped[end + 1..];
        } else {
            return Err(DriverError::InvalidExpression(token.to_string()));
        }
    }
    Ok(SimpleSelector {
        tag,
        classes,
        attrs,
    })
}

fn parse_expr(expr: &str) -> DriverResult<Vec<Step>> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(DriverError::InvalidExpression(
            "empty structural expression".to_string(),
        ));
    }
    let mut steps = Vec::new();
    let mut first = true;
    for (seg_idx, segment) in trimmed.split('>').enumerate() {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(DriverError::InvalidExpression(expr.to_string()));
        }
        for (tok_idx, token) in segment.split_whitespace().enumerate() {
            let selector = parse_simple_selector(token)?;
            let combinator = if first {
                None
            } else if tok_idx == 0 && seg_idx > 0 {
                Some(Combinator::Child)
            } else {
                Some(Combinator::Descendant)
            };
            steps.push(Step {
                combinator,
                selector,
            });
            first = false;
        }
    }
    Ok(steps)
}

#[async_trait]
impl DocumentDriver for InMemoryDriver {
    async fn query_one(&self, expr: &str) -> DriverResult<Option<Element>> {
        let steps = parse_expr(expr)?;
        Ok(self
            .evaluate_steps(&steps)
            .first()
            .map(|node| Self::to_element(node)))
    }

    async fn query_all(&self, expr: &str) -> DriverResult<Vec<Element>> {
        let steps = parse_expr(expr)?;
        Ok(self
            .evaluate_steps(&steps)
            .into_iter()
            .map(Self::to_element)
            .collect())
    }

    async fn evaluate(&self, _script: &str) -> DriverResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.document.url.clone())
    }

    async fn current_title(&self) -> DriverResult<String> {
        Ok(self.document.title.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InMemoryDriver {
        let doc = InMemoryDocument::new(
            InMemoryNode::new("html", "").with_child(
                InMemoryNode::new("body", "").with_child(
                    InMemoryNode::new("div", "")
                        .with_class("scoreboard")
                        .with_child(
                            InMemoryNode::new("span", "Manchester United").with_class("team-name"),
                        ),
                ),
            ),
            "https://example.test/match/1",
            "Match centre",
        );
        InMemoryDriver::new(doc)
    }

    #[tokio::test]
    async fn query_all_wildcard_returns_every_node() {
        let driver = sample();
        let all = driver.query_all("*").await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn query_one_by_class() {
        let driver = sample();
        let found = driver.query_one(".team-name").await.unwrap().unwrap();
        assert_eq!(found.text_content, "Manchester United");
    }

    #[tokio::test]
    async fn child_combinator_restricts_to_direct_children() {
        let driver = sample();
        let direct = driver.query_all("div.scoreboard > span").await.unwrap();
        assert_eq!(direct.len(), 1);
        let none = driver.query_all("body > span").await.unwrap();
        assert!(none.is_empty());
    }
}
