//! Tests for Config serialization, deserialization, and core functionality

use wtf_config::{
    AgentDefaults, Config, FailoverConfig, ProviderConfig, RetryConfig, SanitizerConfig,
};
use tempfile::TempDir;

/// Helper to create a temporary directory for tests
fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Test that default Config has expected values
#[test]
fn test_config_defaults() {
    let config = Config::default();

    // Agent defaults
    assert_eq!(
        config.agent.models,
        [
            "gpt-3.5-turbo-instruct".to_string(),
            "davinci-002".to_string()
        ]
    );
    assert_eq!(config.agent.max_tokens, 256);
    assert_eq!(config.agent.temperature, 0.0);
    assert_eq!(config.agent.max_turns, 20);
    assert_eq!(config.agent.max_empty_outputs, 3);

    // Failover defaults
    assert_eq!(config.failover.base_frequency_penalty, 0.5);
    assert_eq!(config.failover.escalated_frequency_penalty, 1.8);
    assert_eq!(config.failover.escalated_presence_penalty, 0.6);

    // Retry defaults
    assert_eq!(config.retry.attempts, 3);
    assert_eq!(config.retry.delay_ms, 500);
    assert_eq!(config.retry.backoff, 1.1);
    assert_eq!(config.retry.jitter_ms, 100);

    // Sanitizer defaults
    assert_eq!(config.sanitizer.explore_limit, 2);
    assert_eq!(config.sanitizer.final_limit, 25);
    assert_eq!(config.sanitizer.truncate_at, 300);

    // Provider defaults
    assert!(config.provider.api_key.is_empty());
    assert!(config.provider.api_base.is_none());
    assert_eq!(config.provider.request_timeout_secs, 10);
}

/// Test section defaults match the root defaults
#[test]
fn test_section_defaults() {
    assert_eq!(ProviderConfig::default().request_timeout_secs, 10);
    assert_eq!(AgentDefaults::default().max_turns, 20);
    assert_eq!(FailoverConfig::default().base_frequency_penalty, 0.5);
    assert_eq!(RetryConfig::default().attempts, 3);
    assert_eq!(SanitizerConfig::default().final_limit, 25);
}

/// Test Config serialization to JSON
#[test]
fn test_config_serialization() {
    let config = Config::default();
    let json = serde_json::to_string(&config).expect("Failed to serialize");

    let parsed: serde_json::Value = serde_json::from_str(&json).expect("Invalid JSON");

    assert!(parsed.get("provider").is_some());
    assert!(parsed.get("agent").is_some());
    assert!(parsed.get("failover").is_some());
    assert!(parsed.get("retry").is_some());
    assert!(parsed.get("sanitizer").is_some());

    // Unset api_base is omitted
    assert!(parsed["provider"].get("api_base").is_none());
    assert_eq!(parsed["agent"]["models"].as_array().unwrap().len(), 2);
}

/// Test Config deserialization from JSON
#[test]
fn test_config_deserialization() {
    let json = r#"{
        "provider": {
            "api_key": "sk-file",
            "api_base": "http://localhost:8000/v1",
            "request_timeout_secs": 30
        },
        "agent": {
            "models": ["model-a", "model-b"],
            "max_turns": 5
        },
        "retry": {
            "attempts": 5,
            "delay_ms": 0
        },
        "sanitizer": {
            "truncate_at": 1000
        }
    }"#;

    let config: Config = serde_json::from_str(json).expect("Failed to parse");

    assert_eq!(config.provider.api_key, "sk-file");
    assert_eq!(
        config.provider.api_base.as_deref(),
        Some("http://localhost:8000/v1")
    );
    assert_eq!(config.provider.request_timeout_secs, 30);
    assert_eq!(config.agent.models[0], "model-a");
    assert_eq!(config.agent.models[1], "model-b");
    assert_eq!(config.agent.max_turns, 5);
    // Unspecified fields fall back to defaults
    assert_eq!(config.agent.max_tokens, 256);
    assert_eq!(config.retry.attempts, 5);
    assert_eq!(config.retry.delay_ms, 0);
    assert_eq!(config.retry.backoff, 1.1);
    assert_eq!(config.sanitizer.truncate_at, 1000);
    assert_eq!(config.sanitizer.explore_limit, 2);
    assert_eq!(config.failover.escalated_frequency_penalty, 1.8);
}

/// Test an empty object yields full defaults
#[test]
fn test_config_empty_object() {
    let config: Config = serde_json::from_str("{}").expect("Failed to parse");
    assert_eq!(config.agent.models[1], "davinci-002");
    assert_eq!(config.sanitizer.final_limit, 25);
}

/// Test the model set must have exactly two entries
#[test]
fn test_config_rejects_wrong_model_count() {
    let json = r#"{ "agent": { "models": ["only-one"] } }"#;
    assert!(serde_json::from_str::<Config>(json).is_err());

    let json = r#"{ "agent": { "models": ["a", "b", "c"] } }"#;
    assert!(serde_json::from_str::<Config>(json).is_err());
}

/// Test save and load round trip
#[tokio::test]
async fn test_config_save_and_load() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.provider.api_key = "sk-saved".to_string();
    config.agent.max_turns = 7;

    config.save_to(&path).await.expect("Failed to save");
    assert!(path.exists());

    let loaded = Config::load_from(&path).await.expect("Failed to load");
    assert_eq!(loaded.provider.api_key, "sk-saved");
    assert_eq!(loaded.agent.max_turns, 7);
}

/// Test loading a missing file returns defaults
#[tokio::test]
async fn test_config_load_missing_file() {
    let dir = temp_dir();
    let path = dir.path().join("missing.json");

    let config = Config::load_from(&path).await.expect("Failed to load");
    assert_eq!(config.agent.max_turns, 20);
}

/// Test loading invalid JSON is an error
#[tokio::test]
async fn test_config_load_invalid_json() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{not json").unwrap();

    let result = Config::load_from(&path).await;
    assert!(matches!(result, Err(wtf_config::ConfigError::Parse { .. })));
}

/// Test api_base filtering
#[test]
fn test_api_base() {
    let mut config = Config::default();
    assert_eq!(config.api_base(), None);

    config.provider.api_base = Some(String::new());
    assert_eq!(config.api_base(), None);

    config.provider.api_base = Some("http://localhost:8000/v1".to_string());
    assert_eq!(config.api_base().as_deref(), Some("http://localhost:8000/v1"));
}

/// Test replacing the primary model
#[test]
fn test_set_primary_model() {
    let mut config = Config::default();

    config.set_primary_model("custom-model");
    assert_eq!(config.default_model(), "custom-model");
    assert_eq!(config.agent.models[1], "davinci-002");
}

/// Test choosing the failover model as primary swaps the pair
#[test]
fn test_set_primary_model_to_failover_model() {
    let mut config = Config::default();

    config.set_primary_model("davinci-002");
    assert_eq!(config.agent.models[0], "davinci-002");
    assert_eq!(config.agent.models[1], "gpt-3.5-turbo-instruct");
}
