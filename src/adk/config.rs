// SPDX-License-Identifier: MIT

//! Process configuration
//!
//! Built once in `main` from an optional YAML file plus environment
//! variables, then passed by reference to whatever needs it.

use crate::adk::error::SqlAgentError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which provider/model serves one role in the workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSpec {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_provider_retries")]
    pub max_retries: u32,
}

fn default_provider_retries() -> u32 {
    4
}

impl ModelSpec {
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: Some(model.to_string()),
            temperature: 0.0,
            max_retries: default_provider_retries(),
        }
    }
}

/// Models for the three LLM roles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoleModels {
    pub query_gen: ModelSpec,
    pub query_check: ModelSpec,
    pub answer: ModelSpec,
}

impl Default for RoleModels {
    fn default() -> Self {
        Self {
            query_gen: ModelSpec::new("mistral", "codestral-latest"),
            query_check: ModelSpec::new("groq", "llama-3.3-70b-versatile"),
            answer: ModelSpec::new("groq", "llama-3.1-70b-versatile"),
        }
    }
}

/// Knobs of the SQL workflow loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowSettings {
    /// How many times the retry edge may fire before giving up
    pub max_retries: u32,
    /// Pause after each LLM call, in milliseconds
    pub throttle_ms: u64,
    /// Hard cap on node executions per question; raised as needed to fit `max_retries`
    pub recursion_limit: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            throttle_ms: 1500,
            recursion_limit: 50,
        }
    }
}

/// Provider API keys; never read from or written to the config file
#[derive(Clone, Default, PartialEq)]
pub struct ApiKeys {
    pub mistral: Option<String>,
    pub groq: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "***");
        f.debug_struct("ApiKeys")
            .field("mistral", &mask(&self.mistral))
            .field("groq", &mask(&self.groq))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub llm: RoleModels,
    pub workflow: WorkflowSettings,
    #[serde(skip)]
    pub api_keys: ApiKeys,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data.db".to_string(),
            llm: RoleModels::default(),
            workflow: WorkflowSettings::default(),
            api_keys: ApiKeys::default(),
        }
    }
}

impl Config {
    /// Load from `path` (if any), then apply process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, SqlAgentError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    SqlAgentError::config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_yaml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, SqlAgentError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Override fields from environment variables looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SqlAgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(key) = lookup("MISTRAL_API_KEY") {
            self.api_keys.mistral = Some(key);
        }
        if let Some(key) = lookup("GROQ_API_KEY") {
            self.api_keys.groq = Some(key);
        }
        if let Some(raw) = lookup("SQL_AGENT_MAX_RETRIES") {
            self.workflow.max_retries = raw
                .parse()
                .map_err(|_| SqlAgentError::config(format!("invalid SQL_AGENT_MAX_RETRIES: {}", raw)))?;
        }
        if let Some(raw) = lookup("SQL_AGENT_RECURSION_LIMIT") {
            self.workflow.recursion_limit = raw.parse().map_err(|_| {
                SqlAgentError::config(format!("invalid SQL_AGENT_RECURSION_LIMIT: {}", raw))
            })?;
        }
        if let Some(raw) = lookup("SQL_AGENT_THROTTLE_MS") {
            self.workflow.throttle_ms = raw
                .parse()
                .map_err(|_| SqlAgentError::config(format!("invalid SQL_AGENT_THROTTLE_MS: {}", raw)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_role_models() {
        let config = Config::default();
        assert_eq!(config.llm.query_gen.provider, "mistral");
        assert_eq!(config.llm.query_gen.model.as_deref(), Some("codestral-latest"));
        assert_eq!(config.llm.query_check.model.as_deref(), Some("llama-3.3-70b-versatile"));
        assert_eq!(config.llm.answer.max_retries, 4);
        assert_eq!(config.workflow.max_retries, 3);
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
            database_url: "sqlite::memory:"
            llm:
              answer:
                provider: mistral
                temperature: 0.2
            workflow:
              max_retries: 1
        "#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.llm.answer.provider, "mistral");
        assert_eq!(config.llm.answer.model, None);
        assert_eq!(config.llm.answer.max_retries, 4);
        assert_eq!(config.llm.query_gen, ModelSpec::new("mistral", "codestral-latest"));
        assert_eq!(config.workflow.max_retries, 1);
        assert_eq!(config.workflow.throttle_ms, 1500);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite://sales.db"),
            ("GROQ_API_KEY", "gsk"),
            ("SQL_AGENT_THROTTLE_MS", "0"),
            ("SQL_AGENT_RECURSION_LIMIT", "80"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_url, "sqlite://sales.db");
        assert_eq!(config.api_keys.groq.as_deref(), Some("gsk"));
        assert_eq!(config.api_keys.mistral, None);
        assert_eq!(config.workflow.throttle_ms, 0);
        assert_eq!(config.workflow.recursion_limit, 80);
    }

    #[test]
    fn test_invalid_env_number() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == "SQL_AGENT_MAX_RETRIES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, SqlAgentError::Config(_)));
    }

    #[test]
    fn test_api_keys_debug_is_masked() {
        let keys = ApiKeys {
            mistral: Some("secret".to_string()),
            groq: None,
        };
        let printed = format!("{:?}", keys);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("***"));
    }
}
