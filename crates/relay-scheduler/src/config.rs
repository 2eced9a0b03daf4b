//! Scheduler configuration.

use relay_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::registry::STANDARD_ORDER;

/// Settings for ranking passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ranking rule keys, in evaluation order.
    #[serde(default = "default_rules")]
    pub rules: Vec<String>,
    /// Timeout for each bulk fetch from a collaborator, in milliseconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
    /// Deadline for fetching tasks and building every cache of a pass, in
    /// milliseconds.
    #[serde(default = "default_pass_deadline")]
    pub pass_deadline_ms: u64,
}

fn default_rules() -> Vec<String> {
    STANDARD_ORDER.iter().map(|k| k.to_string()).collect()
}

fn default_fetch_timeout() -> u64 {
    10_000
}

fn default_pass_deadline() -> u64 {
    30_000
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            fetch_timeout_ms: default_fetch_timeout(),
            pass_deadline_ms: default_pass_deadline(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the rule order.
    pub fn with_rules(mut self, rules: &[&str]) -> Self {
        self.rules = rules.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Set the per-fetch timeout. Precision below a millisecond is dropped.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = millis(timeout);
        self
    }

    /// Set the pass deadline. Precision below a millisecond is dropped.
    pub fn with_pass_deadline(mut self, deadline: Duration) -> Self {
        self.pass_deadline_ms = millis(deadline);
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn pass_deadline(&self) -> Duration {
        Duration::from_millis(self.pass_deadline_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::Config("at least one ranking rule is required".to_string()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(Error::Config(
                "fetch_timeout_ms must be at least one millisecond".to_string(),
            ));
        }
        if self.pass_deadline_ms < self.fetch_timeout_ms {
            return Err(Error::Config(format!(
                "pass_deadline_ms ({}) is shorter than fetch_timeout_ms ({})",
                self.pass_deadline_ms, self.fetch_timeout_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rules.len(), 8);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SchedulerConfig = serde_yaml::from_str("pass_deadline_ms: 60000").unwrap();
        assert_eq!(config.pass_deadline(), Duration::from_secs(60));
        assert_eq!(config.fetch_timeout_ms, 10_000);
        assert_eq!(config.rules[0], "priority");
    }

    #[test]
    fn test_sub_second_durations_are_kept() {
        let config = SchedulerConfig::default()
            .with_fetch_timeout(Duration::from_millis(500))
            .with_pass_deadline(Duration::from_millis(1_500));
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_timeout(), Duration::from_millis(500));
        assert_eq!(config.pass_deadline(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_sub_millisecond_fetch_timeout_is_rejected() {
        let config = SchedulerConfig::default().with_fetch_timeout(Duration::from_micros(200));
        assert_eq!(config.fetch_timeout_ms, 0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_deadline_shorter_than_fetch_timeout_is_rejected() {
        let config = SchedulerConfig::default()
            .with_fetch_timeout(Duration::from_secs(20))
            .with_pass_deadline(Duration::from_secs(5));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
