//! Pipeline configuration.
//!
//! [`ProcessorConfig`] holds the knobs of the chunk-and-execute pipeline.
//! Values come from code (builder methods), the environment
//! ([`ProcessorConfig::from_env`]) or, with the `yaml` feature, a YAML
//! document. Every constructor path ends in [`ProcessorConfig::validate`].

use crate::error::Result;
use crate::prompt::PromptTemplates;
use crate::selector::TaskKind;
use crate::PipelineError;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`ProcessorConfig::max_chunk_size`].
pub const ENV_MAX_CHUNK_SIZE: &str = "DOCPROC_MAX_CHUNK_SIZE";
/// Environment variable overriding [`ProcessorConfig::map_concurrency`].
pub const ENV_MAP_CONCURRENCY: &str = "DOCPROC_MAP_CONCURRENCY";

/// Configuration for [`DocumentProcessor`](crate::orchestrator::DocumentProcessor).
///
/// ```
/// use doc_processor::config::ProcessorConfig;
///
/// let config = ProcessorConfig::default()
///     .with_max_chunk_size(2_000)
///     .with_map_concurrency(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Maximum chunk length in characters. Keep it well under the model's
    /// context window; the prompt wrapper adds a few hundred characters.
    pub max_chunk_size: usize,

    /// Maximum number of map-phase calls in flight per request.
    pub map_concurrency: usize,

    /// Skip instruction classification and always use this strategy.
    pub force_strategy: Option<TaskKind>,

    /// Prompt templates for both strategies.
    pub prompts: PromptTemplates,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4_000,
            map_concurrency: 4,
            force_strategy: None,
            prompts: PromptTemplates::default(),
        }
    }
}

impl ProcessorConfig {
    pub fn with_max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size;
        self
    }

    pub fn with_map_concurrency(mut self, limit: usize) -> Self {
        self.map_concurrency = limit;
        self
    }

    pub fn with_force_strategy(mut self, kind: TaskKind) -> Self {
        self.force_strategy = Some(kind);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = prompts;
        self
    }

    /// Reject zero sizes and templates missing their placeholders.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        self.validate_execution()
    }

    /// Check the settings strategies use: concurrency and prompt templates.
    /// `max_chunk_size` is left to the chunker.
    pub fn validate_execution(&self) -> Result<()> {
        if self.map_concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "map_concurrency must be greater than zero".to_string(),
            ));
        }
        self.prompts.validate()
    }

    /// Defaults overridden by `DOCPROC_MAX_CHUNK_SIZE` / `DOCPROC_MAP_CONCURRENCY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(size) = parse_var(&lookup, ENV_MAX_CHUNK_SIZE)? {
            config.max_chunk_size = size;
        }
        if let Some(limit) = parse_var(&lookup, ENV_MAP_CONCURRENCY)? {
            config.map_concurrency = limit;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document; missing fields take their defaults.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::InvalidConfig(format!("invalid YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<usize>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<usize>().map(Some).map_err(|_| {
            PipelineError::InvalidConfig(format!(
                "{} must be a positive integer, got '{}'",
                key, raw
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_chunk_size, 4_000);
        assert_eq!(config.map_concurrency, 4);
        assert!(config.force_strategy.is_none());
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(ProcessorConfig::default()
            .with_max_chunk_size(0)
            .validate()
            .unwrap_err()
            .is_config());
        assert!(ProcessorConfig::default()
            .with_map_concurrency(0)
            .validate()
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn test_validate_execution_ignores_chunk_size() {
        let config = ProcessorConfig::default().with_max_chunk_size(0);
        assert!(config.validate().is_err());
        assert!(config.validate_execution().is_ok());
        assert!(config
            .with_prompts(PromptTemplates::default().with_reduce("no slots"))
            .validate_execution()
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ProcessorConfig::from_lookup(lookup(&[
            (ENV_MAX_CHUNK_SIZE, " 1500 "),
            (ENV_MAP_CONCURRENCY, "2"),
        ]))
        .unwrap();
        assert_eq!(config.max_chunk_size, 1500);
        assert_eq!(config.map_concurrency, 2);
    }

    #[test]
    fn test_from_lookup_rejects_garbage_and_zero() {
        let err = ProcessorConfig::from_lookup(lookup(&[(ENV_MAX_CHUNK_SIZE, "big")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_CHUNK_SIZE));
        assert!(ProcessorConfig::from_lookup(lookup(&[(ENV_MAX_CHUNK_SIZE, "0")])).is_err());
        assert!(ProcessorConfig::from_lookup(lookup(&[(ENV_MAX_CHUNK_SIZE, "-5")])).is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: ProcessorConfig =
            serde_json::from_str(r#"{"max_chunk_size": 800, "force_strategy": "global_synthesis"}"#)
                .unwrap();
        assert_eq!(config.max_chunk_size, 800);
        assert_eq!(config.map_concurrency, 4);
        assert_eq!(config.force_strategy, Some(TaskKind::GlobalSynthesis));
        assert_eq!(config.prompts, PromptTemplates::default());
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_from_yaml() {
        let config = ProcessorConfig::from_yaml_str(
            "max_chunk_size: 1200\nprompts:\n  map_summary: \"Summarize: {chunk}\"\n",
        )
        .unwrap();
        assert_eq!(config.max_chunk_size, 1200);
        assert_eq!(config.prompts.map_summary, "Summarize: {chunk}");
        assert_eq!(config.prompts.reduce, crate::prompt::REDUCE_TEMPLATE);

        assert!(ProcessorConfig::from_yaml_str("map_concurrency: 0\n").is_err());
    }
}
