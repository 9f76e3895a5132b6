//! GoalTree configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::evolution::EvolutionConfig;
use crate::pipeline::PipelineConfig;

/// Main GoalTree configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Decomposition defaults
    pub decomposition: DecompositionConfig,

    /// Evolution trigger tunables
    pub evolution: EvolutionSettings,

    /// Pipeline selection tunables
    pub pipeline: PipelineSettings,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Prompt template overrides
    pub prompts: PromptsConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set. Call this early
    /// in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .goaltree.yml
        let local_config = PathBuf::from(".goaltree.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/goaltree/goaltree.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("goaltree").join("goaltree.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .context(format!("Environment variable {} not set", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 120_000,
        }
    }
}

/// Decomposition defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Default target depth when neither caller nor analysis decides
    #[serde(rename = "default-depth")]
    pub default_depth: Option<u8>,

    /// Abort on generation failures instead of falling back
    pub strict: bool,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            default_depth: None,
            strict: false,
        }
    }
}

/// Evolution trigger tunables (file representation)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionSettings {
    /// Minimum time between evolutions in milliseconds
    #[serde(rename = "cooldown-ms")]
    pub cooldown_ms: i64,

    /// Minimum completions before evolution is considered
    #[serde(rename = "min-samples")]
    pub min_samples: usize,

    /// Recent completions visible to trigger and needs assessment
    #[serde(rename = "recent-window")]
    pub recent_window: usize,
}

impl Default for EvolutionSettings {
    fn default() -> Self {
        let defaults = EvolutionConfig::default();
        Self {
            cooldown_ms: defaults.cooldown_ms,
            min_samples: defaults.min_samples,
            recent_window: defaults.recent_window,
        }
    }
}

impl From<&EvolutionSettings> for EvolutionConfig {
    fn from(settings: &EvolutionSettings) -> Self {
        Self {
            cooldown_ms: settings.cooldown_ms,
            min_samples: settings.min_samples,
            recent_window: settings.recent_window,
        }
    }
}

/// Pipeline selection tunables (file representation)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Candidates kept after scoring
    #[serde(rename = "pool-size")]
    pub pool_size: usize,

    /// Variety caps per difficulty tier
    #[serde(rename = "easy-cap")]
    pub easy_cap: usize,
    #[serde(rename = "medium-cap")]
    pub medium_cap: usize,
    #[serde(rename = "hard-cap")]
    pub hard_cap: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            pool_size: defaults.pool_size,
            easy_cap: defaults.easy_cap,
            medium_cap: defaults.medium_cap,
            hard_cap: defaults.hard_cap,
        }
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            pool_size: settings.pool_size,
            easy_cap: settings.easy_cap,
            medium_cap: settings.medium_cap,
            hard_cap: settings.hard_cap,
            ..Default::default()
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the document store root
    #[serde(rename = "store-path")]
    pub store_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("goaltree")
                .join("store"),
        }
    }
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory with `{key}.hbs` override templates
    #[serde(rename = "templates-dir")]
    pub templates_dir: Option<PathBuf>,
}
