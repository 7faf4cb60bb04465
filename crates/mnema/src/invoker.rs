// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP model invoker for OpenAI-compatible chat completion APIs.
//!
//! Works with any backend that serves `POST {base_url}/chat/completions`
//! (Ollama, llama.cpp server, vLLM, hosted APIs). Transient statuses are
//! retried once; the request timeout comes from `[model] timeout_secs`.

use std::time::Duration;

use async_trait::async_trait;
use mnema_config::model::ModelConfig;
use mnema_core::types::GenerateRequest;
use mnema_core::{MnemaError, ModelInvoker};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// [`ModelInvoker`] over an OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct HttpModelInvoker {
    client: reqwest::Client,
    endpoint: String,
    available_models: Vec<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpModelInvoker {
    pub fn new(config: &ModelConfig) -> Result<Self, MnemaError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| MnemaError::Config(format!("invalid API key header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MnemaError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            available_models: config.available_models.clone(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Shortens the retry delay (for tests).
    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn serves(&self, model: &str) -> bool {
        self.available_models.is_empty() || self.available_models.iter().any(|m| m == model)
    }
}

#[async_trait]
impl ModelInvoker for HttpModelInvoker {
    async fn generate(&self, request: GenerateRequest) -> Result<String, MnemaError> {
        if !self.serves(&request.model) {
            return Err(MnemaError::ModelUnavailable {
                model: request.model,
            });
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        let body = ChatRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, model = %request.model, "retrying generation after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| MnemaError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(
                status = %status,
                attempt,
                model = %request.model,
                "generation response received"
            );

            if status.is_success() {
                let parsed: ChatResponse = response.json().await.map_err(|e| {
                    MnemaError::Provider {
                        message: format!("failed to parse API response: {e}"),
                        source: Some(Box::new(e)),
                    }
                })?;
                return parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| MnemaError::Provider {
                        message: "API response contained no completion".into(),
                        source: None,
                    });
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(MnemaError::ModelUnavailable {
                    model: request.model,
                });
            }

            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("API returned {status}: {}", api_err.error.message),
                Err(_) => format!("API returned {status}: {body}"),
            };
            let error = MnemaError::Provider {
                message,
                source: None,
            };
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, "transient error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| MnemaError::Provider {
            message: "generation failed after retries".into(),
            source: None,
        }))
    }
}

/// Status codes worth one retry.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}
