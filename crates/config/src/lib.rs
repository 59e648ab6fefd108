//! Configuration for wtf
//!
//! Model endpoint, agent limits, failover penalties, retry schedule and
//! sanitizer limits, stored as JSON under `~/.wtf`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

/// Environment variable consulted when no key is stored in the config file
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Config file failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG FILE ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("MALFORMED CONFIG AT {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("CONFIG ENCODING ERROR: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Completion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Default agent parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// The two models the agent fails over between, primary first
    #[serde(default = "default_models")]
    pub models: [String; 2],
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_max_empty_outputs")]
    pub max_empty_outputs: usize,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            models: default_models(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_turns: default_max_turns(),
            max_empty_outputs: default_max_empty_outputs(),
        }
    }
}

fn default_models() -> [String; 2] {
    [
        "gpt-3.5-turbo-instruct".to_string(),
        "davinci-002".to_string(),
    ]
}

fn default_max_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_turns() -> usize {
    20
}

fn default_max_empty_outputs() -> usize {
    3
}

/// Generation penalties chosen from the transcript's error history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    #[serde(default = "default_base_frequency_penalty")]
    pub base_frequency_penalty: f32,
    #[serde(default = "default_escalated_frequency_penalty")]
    pub escalated_frequency_penalty: f32,
    #[serde(default = "default_escalated_presence_penalty")]
    pub escalated_presence_penalty: f32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            base_frequency_penalty: default_base_frequency_penalty(),
            escalated_frequency_penalty: default_escalated_frequency_penalty(),
            escalated_presence_penalty: default_escalated_presence_penalty(),
        }
    }
}

fn default_base_frequency_penalty() -> f32 {
    0.5
}

fn default_escalated_frequency_penalty() -> f32 {
    1.8
}

fn default_escalated_presence_penalty() -> f32 {
    0.6
}

/// Bounded retry around every model call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: f64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
            backoff: default_backoff(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    500
}

fn default_backoff() -> f64 {
    1.1
}

fn default_jitter_ms() -> u64 {
    100
}

/// Row limits and output budget for executed queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    #[serde(default = "default_explore_limit")]
    pub explore_limit: u32,
    #[serde(default = "default_final_limit")]
    pub final_limit: u32,
    #[serde(default = "default_truncate_at")]
    pub truncate_at: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            explore_limit: default_explore_limit(),
            final_limit: default_final_limit(),
            truncate_at: default_truncate_at(),
        }
    }
}

fn default_explore_limit() -> u32 {
    2
}

fn default_final_limit() -> u32 {
    25
}

fn default_truncate_at() -> usize {
    300
}

/// Root parameters
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentDefaults,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

impl Config {
    /// Load parameters from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ NO CONFIG AT {:?}, USING DEFAULTS", path);
            return Ok(Config::default());
        }

        debug!("◆ LOADING CONFIG FROM {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save parameters to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ SAVING CONFIG TO {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// API key from the file, falling back to `OPENAI_API_KEY`
    pub fn api_key(&self) -> Option<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    /// Resolve the access key against an explicit environment value
    pub fn resolve_api_key(&self, env_key: Option<String>) -> Option<String> {
        let key = self.provider.api_key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }

        env_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    /// Whether any API key is available
    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Custom endpoint base URL, if one is set
    pub fn api_base(&self) -> Option<String> {
        self.provider
            .api_base
            .clone()
            .filter(|base| !base.is_empty())
    }

    /// Get the primary model
    pub fn default_model(&self) -> String {
        self.agent.models[0].clone()
    }

    /// Replace the primary model, keeping the failover model
    pub fn set_primary_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        if model == self.agent.models[1] {
            self.agent.models.swap(0, 1);
        } else {
            self.agent.models[0] = model;
        }
    }
}

/// Establish a default config if none exists
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("◆ CONFIG ALREADY EXISTS AT {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("◆ DEFAULT CONFIG WRITTEN TO {:?}", config_path);
    }

    Config::load().await
}
