//! Configuration loading and resolution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use temporal_abstraction::ExecutorConfig;

use crate::error::{QueryError, QueryResult};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_RESULTS_CAPACITY: usize = 1000;

/// Tunables for one query run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Bound of the key batch queue between reader and executor.
    pub queue_capacity: usize,
    /// Bound of the results queue between executor and sink.
    pub results_capacity: usize,
    pub firing_limit: usize,
    /// Keep per-key working memory across runs.
    pub stateful: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            results_capacity: DEFAULT_RESULTS_CAPACITY,
            firing_limit: executor.firing_limit,
            stateful: executor.stateful,
        }
    }
}

impl QueryConfig {
    /// Defaults overridden by `TABS_*` environment variables.
    pub fn from_env() -> QueryResult<Self> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> QueryResult<Self> {
        if let Some(v) = lookup("TABS_QUEUE_CAPACITY") {
            self.queue_capacity = parse_count("TABS_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("TABS_RESULTS_CAPACITY") {
            self.results_capacity = parse_count("TABS_RESULTS_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("TABS_FIRING_LIMIT") {
            self.firing_limit = parse_count("TABS_FIRING_LIMIT", &v)?;
        }
        if let Some(v) = lookup("TABS_STATEFUL") {
            self.stateful = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(QueryError::Config(format!(
                        "TABS_STATEFUL must be a boolean, got {other:?}"
                    )))
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> QueryResult<()> {
        if self.queue_capacity == 0 || self.results_capacity == 0 {
            return Err(QueryError::Config("queue capacities must be at least 1".into()));
        }
        Ok(())
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            firing_limit: self.firing_limit,
            stateful: self.stateful,
        }
    }
}

fn parse_count(name: &str, value: &str) -> QueryResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| QueryError::Config(format!("{name} must be a non-negative integer, got {value:?}")))
}

/// Resolve the knowledge base path.
pub fn resolve_knowledge_path(explicit: Option<&str>) -> PathBuf {
    resolve_path(explicit, "TABS_KNOWLEDGE", "knowledge.json")
}

/// Resolve the key batch data path.
pub fn resolve_data_path(explicit: Option<&str>) -> PathBuf {
    resolve_path(explicit, "TABS_DATA", "data.jsonl")
}

fn resolve_path(explicit: Option<&str>, env_var: &str, file_name: &str) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(env_var) {
        return PathBuf::from(env_path);
    }

    PathBuf::from(".tabs").join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_overrides_apply() {
        let config = QueryConfig::default()
            .with_overrides(lookup(&[("TABS_QUEUE_CAPACITY", "8"), ("TABS_STATEFUL", "true")]))
            .unwrap();
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.results_capacity, DEFAULT_RESULTS_CAPACITY);
        assert!(config.stateful);
        assert!(config.executor_config().stateful);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(QueryConfig::default()
            .with_overrides(lookup(&[("TABS_FIRING_LIMIT", "lots")]))
            .is_err());
        assert!(QueryConfig::default()
            .with_overrides(lookup(&[("TABS_STATEFUL", "maybe")]))
            .is_err());
        assert!(QueryConfig::default()
            .with_overrides(lookup(&[("TABS_QUEUE_CAPACITY", "0")]))
            .is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(resolve_knowledge_path(Some("kb.json")), PathBuf::from("kb.json"));
    }
}
