//! Registry of ranking rules.
//!
//! The table is built and validated once when the scheduler starts. Key
//! conflicts and unknown keys are startup errors, never per-pass failures.

use relay_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::comparator::{
    ByAge, ByDependents, ByGenerateTask, ByPriority, ByRecentFailure, ByRuntime,
    BySimilarFailure, ByTaskGroup, ComparatorChain, RankingRule,
};

/// Rule keys in dispatch policy order.
pub const STANDARD_ORDER: [&str; 8] = [
    "priority",
    "dependents",
    "age",
    "runtime",
    "recent_failure",
    "similar_failure",
    "task_group",
    "generate_task",
];

/// Lookup table from rule key to rule.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn RankingRule>>,
    index: HashMap<&'static str, usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in rules in policy order.
    pub fn standard() -> Result<Self> {
        Self::new()
            .with_rule(ByPriority)?
            .with_rule(ByDependents)?
            .with_rule(ByAge)?
            .with_rule(ByRuntime)?
            .with_rule(ByRecentFailure)?
            .with_rule(BySimilarFailure)?
            .with_rule(ByTaskGroup)?
            .with_rule(ByGenerateTask)
    }

    /// Register a rule. Fails if the key is already taken.
    pub fn register<R: RankingRule + 'static>(&mut self, rule: R) -> Result<()> {
        let key = rule.key();
        if self.index.contains_key(key) {
            return Err(Error::DuplicateRule(key.to_string()));
        }
        self.index.insert(key, self.rules.len());
        self.rules.push(Arc::new(rule));
        Ok(())
    }

    pub fn with_rule<R: RankingRule + 'static>(mut self, rule: R) -> Result<Self> {
        self.register(rule)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn RankingRule>> {
        self.index.get(key).map(|&i| self.rules[i].clone())
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.key()).collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<dyn RankingRule>> {
        self.rules.iter()
    }

    /// Assemble a chain from the given keys, in the given order.
    pub fn chain<S: AsRef<str>>(&self, keys: &[S]) -> Result<ComparatorChain> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(keys.len());

        for key in keys {
            let key = key.as_ref();
            let rule = self
                .get(key)
                .ok_or_else(|| Error::UnknownRule(key.to_string()))?;
            if !seen.insert(rule.key()) {
                return Err(Error::DuplicateRule(key.to_string()));
            }
            rules.push(rule);
        }

        Ok(ComparatorChain::new(rules))
    }

    /// Chain of every registered rule in registration order.
    pub fn full_chain(&self) -> ComparatorChain {
        ComparatorChain::new(self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_order() {
        let registry = RuleRegistry::standard().unwrap();
        assert_eq!(registry.keys(), STANDARD_ORDER.to_vec());
        assert_eq!(registry.full_chain().keys(), STANDARD_ORDER.to_vec());
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let mut registry = RuleRegistry::standard().unwrap();
        let err = registry.register(ByPriority).unwrap_err();
        assert!(matches!(err, Error::DuplicateRule(ref key) if key == "priority"));
    }

    #[test]
    fn test_unknown_rule_is_an_error() {
        let registry = RuleRegistry::standard().unwrap();
        let err = registry.chain(&["priority", "coin_flip"]).unwrap_err();
        assert!(matches!(err, Error::UnknownRule(ref key) if key == "coin_flip"));
    }

    #[test]
    fn test_repeated_key_in_chain_is_an_error() {
        let registry = RuleRegistry::standard().unwrap();
        assert!(registry.chain(&["age", "age"]).is_err());
    }

    #[test]
    fn test_chain_keeps_requested_order() {
        let registry = RuleRegistry::standard().unwrap();
        let chain = registry.chain(&["age", "priority"]).unwrap();
        assert_eq!(chain.keys(), vec!["age", "priority"]);
    }
}
