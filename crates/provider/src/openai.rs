//! OpenAI-compatible `/completions` access.

use crate::*;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Legacy completions endpoint client
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: Option<String>) -> Self {
        Self::with_timeout(api_key, api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        api_base: Option<String>,
        timeout: Duration,
    ) -> Self {
        let api_base = api_base
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.into(),
            api_base,
        }
    }

    fn build_request(&self, params: &CompletionParams) -> Value {
        let mut body = json!({
            "model": &params.model,
            "prompt": &params.prompt,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "frequency_penalty": params.frequency_penalty,
            "presence_penalty": params.presence_penalty,
        });

        if !params.stop.is_empty() {
            body["stop"] = json!(params.stop);
        }

        body
    }

    fn parse_response(&self, json: Value) -> Result<Completion> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let text = choice["text"]
            .as_str()
            .ok_or(ProviderError::InvalidResponse)?
            .to_string();
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let usage = if let Some(usage) = json["usage"].as_object() {
            let count = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0) as u32;
            Usage {
                prompt_tokens: count("prompt_tokens"),
                completion_tokens: count("completion_tokens"),
                total_tokens: count("total_tokens"),
            }
        } else {
            Usage::default()
        };

        Ok(Completion {
            text,
            finish_reason,
            usage,
        })
    }

    /// Map a non-success response onto the transport error classes
    fn classify_error(status: u16, json: &Value) -> ProviderError {
        let error = &json["error"];
        let message = error["message"]
            .as_str()
            .unwrap_or("UNKNOWN ERROR")
            .to_string();
        let code = error["code"].as_str().unwrap_or_default();
        let kind = error["type"].as_str().unwrap_or_default();

        if status == 429 || code == "rate_limit_exceeded" || kind == "rate_limit_error" {
            return ProviderError::RateLimited;
        }
        if code == "context_length_exceeded" || message.contains("maximum context length") {
            return ProviderError::ContextLengthExceeded(message);
        }
        ProviderError::Api(message)
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, params: CompletionParams) -> Result<Completion> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }
        trace!("◆ POST {}/completions", self.api_base);
        params.trace();

        let url = format!("{}/completions", self.api_base);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            let json = serde_json::from_str(&raw).unwrap_or(Value::Null);
            return Err(Self::classify_error(status.as_u16(), &json));
        }

        let json: Value = serde_json::from_str(&raw)?;
        let completion = self.parse_response(json)?;
        debug!(
            "◆ COMPLETION: {} TOKENS, FINISH {}",
            completion.usage.completion_tokens, completion.finish_reason
        );

        Ok(completion)
    }
}
