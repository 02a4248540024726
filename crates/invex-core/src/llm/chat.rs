//! OpenAI-compatible chat-completions client (LM Studio, OpenRouter).

use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::prompt::{TEXT_SYSTEM_PROMPT, VISION_INSTRUCTION, VISION_SYSTEM_PROMPT};
use super::{ModelClient, ModelRequest};
use crate::error::LlmError;
use crate::models::config::LlmConfig;

/// Longest error body kept in [`LlmError::Status`].
const MAX_ERROR_BODY: usize = 500;

/// Chat-completions client with retry on transient failures.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("invex/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Request body for `request`.
    pub fn payload(&self, request: &ModelRequest) -> Value {
        match request {
            ModelRequest::Text { prompt } => json!({
                "model": self.config.text_model,
                "messages": [
                    {
                        "role": "system",
                        "content": [{"type": "text", "text": TEXT_SYSTEM_PROMPT}]
                    },
                    {
                        "role": "user",
                        "content": [{"type": "text", "text": prompt}]
                    }
                ],
                "temperature": self.config.temperature,
                "max_tokens": self.config.max_tokens,
            }),
            ModelRequest::Vision { images } => {
                let mut content: Vec<Value> = images
                    .iter()
                    .map(|img| json!({"type": "image_url", "image_url": {"url": img.data_url()}}))
                    .collect();
                content.push(json!({"type": "text", "text": VISION_INSTRUCTION}));

                json!({
                    "model": self.config.vision_model,
                    "messages": [
                        {"role": "system", "content": VISION_SYSTEM_PROMPT},
                        {"role": "user", "content": content}
                    ],
                    "temperature": self.config.temperature,
                    "max_tokens": self.config.max_tokens,
                })
            }
        }
    }

    fn endpoint(&self, request: &ModelRequest) -> (&str, Option<&str>) {
        match request {
            ModelRequest::Text { .. } => self.config.text_endpoint(),
            ModelRequest::Vision { .. } => (self.config.vision_endpoint(), None),
        }
    }

    async fn post_once(&self, url: &str, api_key: Option<&str>, body: &Value) -> Result<String, LlmError> {
        let mut builder = self.http.post(url).json(body);
        if let Some(key) = api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| LlmError::Malformed(e.to_string()))?;
        extract_content(&value)
    }
}

impl ModelClient for ChatClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String, LlmError> {
        let (url, api_key) = self.endpoint(request);
        let body = self.payload(request);
        let mut last_err = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = retry_delay_ms(self.config.retry_backoff_ms, attempt);
                warn!("Retry {}/{} after {}ms", attempt, self.config.max_retries, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.post_once(url, api_key, &body).await {
                Ok(content) => {
                    debug!("Model answered with {} characters", content.len());
                    return Ok(content);
                }
                Err(e) if e.is_transient() => {
                    warn!("Attempt {} against {} failed: {}", attempt + 1, url, e);
                    last_err = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.config.max_retries + 1,
            last: last_err,
        })
    }
}

/// Delay before retry `attempt` (1-based), doubling from `base_ms` and
/// saturating instead of overflowing.
fn retry_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Message text of a chat-completions response.
///
/// Reads `choices[0].message.content`, then `choices[0].text`. Empty strings
/// count as missing.
pub(crate) fn extract_content(response: &Value) -> Result<String, LlmError> {
    let choice = response.pointer("/choices/0");
    let content = choice
        .and_then(|c| c.pointer("/message/content"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            choice
                .and_then(|c| c.get("text"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        });

    match content {
        Some(text) => Ok(text.to_string()),
        None => Err(LlmError::EmptyContent(
            serde_json::to_string_pretty(response).unwrap_or_else(|_| response.to_string()),
        )),
    }
}
