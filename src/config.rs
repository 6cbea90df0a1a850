//! Configuration for retrieval evaluation.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{EvalError, Result};
use crate::metrics::MetricsPolicy;
use crate::quality::ScoringConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.openai.com")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "gpt-4o-mini")
    pub model: String,

    /// Maximum tokens for response (optional)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation (optional)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.0
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Search backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search service.
    #[serde(default)]
    pub api_base: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Base URL of an optional `/rerank` service.
    #[serde(default)]
    pub rerank_api_base: Option<String>,

    /// Model name sent to the re-ranker.
    #[serde(default = "default_rerank_model")]
    pub rerank_model: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rerank_model() -> String {
    "BAAI/bge-reranker-v2-m3".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            timeout_secs: default_timeout_secs(),
            rerank_api_base: None,
            rerank_model: default_rerank_model(),
        }
    }
}

/// Settings for the evaluation flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Candidates fetched from the search backend; metrics use all of them.
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,

    /// Hits kept as answer context after re-ranking; quality is scored on these.
    #[serde(default = "default_context_k")]
    pub context_k: usize,

    /// Maximum number of questions evaluated at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_candidate_k() -> usize {
    30
}

fn default_context_k() -> usize {
    10
}

fn default_max_concurrency() -> usize {
    10
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            candidate_k: default_candidate_k(),
            context_k: default_context_k(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,

    /// Search backend settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Composite quality score calibration
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Conventions for undefined metrics
    #[serde(default)]
    pub metrics: MetricsPolicy,

    /// Evaluation flow settings
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileSection>,
    search: Option<SearchConfig>,
    scoring: Option<ScoringConfig>,
    metrics: Option<MetricsPolicy>,
    evaluation: Option<EvaluationConfig>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, LLM_MODEL, SEARCH_API_BASE, ...)
    /// 2. Config file (~/.config/rag-retrieval-eval/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override values from environment variables.
    fn apply_env(&mut self) {
        if let Ok(api_base) = env::var("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm.model = model;
        }

        if let Some(tokens) = parsed_env("LLM_MAX_TOKENS") {
            self.llm.max_tokens = tokens;
        }

        if let Some(temp) = parsed_env("LLM_TEMPERATURE") {
            self.llm.temperature = temp;
        }

        if let Some(secs) = parsed_env("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = secs;
        }

        if let Ok(api_base) = env::var("SEARCH_API_BASE") {
            self.search.api_base = api_base;
        }

        if let Some(secs) = parsed_env("SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = secs;
        }

        if let Ok(api_base) = env::var("RERANK_API_BASE") {
            self.search.rerank_api_base = Some(api_base);
        }

        if let Ok(model) = env::var("RERANK_MODEL") {
            self.search.rerank_model = model;
        }

        if let Some(limit) = parsed_env("EVAL_MAX_CONCURRENCY") {
            self.evaluation.max_concurrency = limit;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            if let Some(api_base) = llm.api_base {
                config.llm.api_base = api_base;
            }
            if let Some(api_key) = llm.api_key {
                config.llm.api_key = api_key;
            }
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                config.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                config.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(search) = file_config.search {
            config.search = search;
        }
        if let Some(scoring) = file_config.scoring {
            config.scoring = scoring;
        }
        if let Some(metrics) = file_config.metrics {
            config.metrics = metrics;
        }
        if let Some(evaluation) = file_config.evaluation {
            config.evaluation = evaluation;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-retrieval-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the settings every command needs.
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.metrics.validate()?;

        if self.evaluation.max_concurrency == 0 {
            return Err(EvalError::Config(
                "evaluation.max_concurrency must be at least 1".to_string(),
            ));
        }

        if self.evaluation.context_k == 0 || self.evaluation.candidate_k == 0 {
            return Err(EvalError::Config(
                "evaluation.candidate_k and evaluation.context_k must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate that LLM settings are present.
    pub fn validate_llm(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(EvalError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(EvalError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() {
            return Err(EvalError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Validate that a search service is configured.
    pub fn validate_search(&self) -> Result<()> {
        if self.search.api_base.is_empty() {
            return Err(EvalError::Config(
                "Search API base URL is required. Set SEARCH_API_BASE environment variable or add to config file.".to_string()
            ));
        }
        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.api_base.is_empty());
        assert!(config.llm.api_key.is_empty());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.evaluation.candidate_k, 30);
        assert_eq!(config.evaluation.context_k, 10);
        assert_eq!(config.evaluation.max_concurrency, 10);
        assert_eq!(config.scoring.variance_ceiling, 0.1);
        assert_eq!(config.scoring.source_saturation, 5);
        assert_eq!(config.metrics.empty_ground_truth_recall, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_llm_fails_without_required_fields() {
        let config = Config::default();
        assert!(config.validate_llm().is_err());
        assert!(config.validate_search().is_err());
    }

    #[test]
    fn test_with_llm() {
        let config = Config::with_llm("https://api.example.com", "test-key", "gpt-4");
        assert_eq!(config.llm.api_base, "https://api.example.com");
        assert_eq!(config.llm.api_key, "test-key");
        assert_eq!(config.llm.model, "gpt-4");
        assert!(config.validate_llm().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
llm:
  model: local-model
  timeout_secs: 15
scoring:
  variance_ceiling: 0.2
evaluation:
  max_concurrency: 4
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.llm.timeout_secs, 15);
        assert_eq!(config.scoring.variance_ceiling, 0.2);
        assert_eq!(config.scoring.average_weight, 60.0);
        assert_eq!(config.evaluation.max_concurrency, 4);
        assert_eq!(config.evaluation.candidate_k, 30);
        assert_eq!(config.search.timeout_secs, 30);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "search:\n  api_base: http://localhost:9000\nmetrics:\n  empty_ground_truth_recall: 1.0\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.search.api_base, "http://localhost:9000");
        assert_eq!(config.metrics.empty_ground_truth_recall, 1.0);
        assert!(config.validate_search().is_ok());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("llm: [unclosed"),
            Err(EvalError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.evaluation.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_policies() {
        let config = Config::from_yaml("metrics:\n  empty_ground_truth_recall: 2.5\n").unwrap();
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));

        let config = Config::from_yaml("metrics:\n  empty_ground_truth_recall: .nan\n").unwrap();
        assert!(config.metrics.empty_ground_truth_recall.is_nan());
        assert!(config.validate().is_err());

        let config = Config::from_yaml("scoring:\n  average_weight: 90\n").unwrap();
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }
}
