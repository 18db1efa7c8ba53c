//! YAML configuration loader (§6): permission rule lists, model table, and
//! API keys with `${ENV_VAR}` expansion over an environment-driven
//! configuration pattern, expressed as a config file rather than process
//! env flags.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;
use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub ask: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_context_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub permissions: PermissionsConfig,
    pub default_model: Option<String>,
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let expanded = expand_env_vars(raw);
        let mut config: Config = serde_yaml::from_str(&expanded)?;
        for (provider, key) in config.api_keys.iter_mut() {
            if key.trim().is_empty() {
                return Err(CoreError::Config(format!("empty api key for provider {provider}")));
            }
        }
        Ok(config)
    }

    pub fn resolve_model(&self, name: &str) -> Result<&ModelConfig> {
        self.models
            .get(name)
            .ok_or_else(|| CoreError::Config(format!("unknown model: {name}")))
    }
}

/// Replaces every `${VAR}` occurrence with the value of the environment
/// variable `VAR`; an unset variable becomes the empty string. A bare `$`
/// or unterminated `${` is left as-is.
fn expand_env_vars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var_name = &after[..end];
                out.push_str(&std::env::var(var_name).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_env_var() {
        // SAFETY: test-only process-local env mutation, single-threaded test.
        unsafe { std::env::set_var("CORE_TEST_KEY", "sk-test-123") };
        let expanded = expand_env_vars("api_keys:\n  openai: ${CORE_TEST_KEY}\n");
        assert!(expanded.contains("sk-test-123"));
        unsafe { std::env::remove_var("CORE_TEST_KEY") };
    }

    #[test]
    fn unset_var_expands_to_empty_string() {
        let expanded = expand_env_vars("x: ${CORE_TEST_DEFINITELY_UNSET}");
        assert_eq!(expanded, "x: ");
    }

    #[test]
    fn parses_permission_rules_and_models() {
        let raw = "\
permissions:
  allow:
    - \"Shell(git:*)\"
  deny:
    - \"Shell(rm:*)\"
default_model: gpt
models:
  gpt:
    provider: openai
    temperature: 0.2
";
        let config = Config::parse(raw).unwrap();
        assert_eq!(config.permissions.allow, vec!["Shell(git:*)".to_string()]);
        assert_eq!(config.default_model.as_deref(), Some("gpt"));
        assert_eq!(config.resolve_model("gpt").unwrap().provider, "openai");
    }

    #[test]
    fn unknown_model_is_a_config_error() {
        let config = Config::parse("default_model: gpt\n").unwrap();
        assert!(config.resolve_model("missing").is_err());
    }
}
