//! Selector Registry: the source of truth the Resolution Engine looks
//! selectors up in. Registration is idempotent for structurally-identical
//! redefinitions and rejected otherwise, matching §8's register() contract.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::model::SemanticSelector;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("selector `{0}` is already registered with a different definition")]
    ConflictingRedefinition(String),
    #[error("selector `{0}` not found")]
    NotFound(String),
}

#[derive(Default)]
pub struct SelectorRegistry {
    selectors: RwLock<HashMap<String, SemanticSelector>>,
}

impl SelectorRegistry {
    /// Same name + structurally-equal definition is a no-op; a divergent
    /// redefinition under an existing name is rejected rather than
    /// silently overwriting metrics-bearing state.
    pub async fn register(&self, selector: SemanticSelector) -> Result<(), RegistryError> {
        let mut selectors = self.selectors.write().await;
        match selectors.get(&selector.name) {
            Some(existing) if existing.structurally_equal(&selector) => Ok(()),
            Some(_) => Err(RegistryError::ConflictingRedefinition(selector.name)),
            None => {
                selectors.insert(selector.name.clone(), selector);
                Ok(())
            }
        }
    }

    pub async fn deregister(&self, name: &str) -> Result<(), RegistryError> {
        let mut selectors = self.selectors.write().await;
        selectors
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub async fn get(&self, name: &str) -> Option<SemanticSelector> {
        self.selectors.read().await.get(name).cloned()
    }

    pub async fn update_strategy_stats(
        &self,
        selector_name: &str,
        strategy_id: &str,
        success: bool,
        resolution_time_ms: f64,
    ) {
        let mut selectors = self.selectors.write().await;
        if let Some(selector) = selectors.get_mut(selector_name) {
            if let Some(strategy) = selector.strategy_mut(strategy_id) {
                strategy.record_attempt(success, resolution_time_ms);
            }
        }
    }

    pub async fn list(&self) -> Vec<SemanticSelector> {
        self.selectors.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StrategyPattern;
    use crate::strategy::StrategyConfig;

    fn selector(threshold: f64) -> SemanticSelector {
        SemanticSelector::new(
            "home_team_name",
            "",
            "production",
            vec![StrategyPattern::new(
                "p1",
                1,
                StrategyConfig::TextAnchor {
                    anchor_text: "Manchester United".into(),
                    proximity_selector: None,
                    case_sensitive: false,
                },
            )],
            vec![],
            threshold,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn re_registering_identical_selector_is_a_no_op() {
        let registry = SelectorRegistry::default();
        registry.register(selector(0.8)).await.unwrap();
        registry.register(selector(0.8)).await.unwrap();
    }

    #[tokio::test]
    async fn conflicting_redefinition_is_rejected() {
        let registry = SelectorRegistry::default();
        registry.register(selector(0.8)).await.unwrap();
        let err = registry.register(selector(0.9)).await.unwrap_err();
        assert_eq!(
            err,
            RegistryError::ConflictingRedefinition("home_team_name".to_string())
        );
    }
}
