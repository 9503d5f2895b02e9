//! OpenAI-compatible completions adapter.
//!
//! Both request kinds go through the `/completions` endpoint: greedy
//! generation with stop sequences, and log-likelihood scoring via
//! `echo=true, logprobs=1, max_tokens=0`, reading the continuation's token
//! logprobs out of the echoed prompt by character offset.

use crate::error::{Result, TaskEvalError};
use crate::models::{LanguageModel, ModelConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug)]
pub struct OpenAICompletions {
    client: Client,
    url: String,
    model: String,
    config: ModelConfig,
}

/// Factory for the model registry.
pub fn openai(config: &ModelConfig) -> Result<Box<dyn LanguageModel>> {
    Ok(Box::new(OpenAICompletions::new(config.clone())?))
}

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest {
    model: String,
    prompt: String,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    logprobs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    echo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionChoice {
    text: String,
    logprobs: Option<Logprobs>,
}

#[derive(Debug, Clone, Deserialize)]
struct Logprobs {
    token_logprobs: Vec<Option<f64>>,
    text_offset: Vec<usize>,
    #[serde(default)]
    top_logprobs: Vec<Option<HashMap<String, f64>>>,
}

impl OpenAICompletions {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| TaskEvalError::MissingField("base_url".to_string()))?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| TaskEvalError::MissingField("model".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(TaskEvalError::HttpError)?;

        Ok(Self {
            client,
            url: format!("{}/completions", base_url.trim_end_matches('/')),
            model,
            config,
        })
    }

    /// Send one completion request with retries and exponential backoff.
    async fn send(&self, request: &CompletionRequest) -> Result<CompletionChoice> {
        let mut last_error = None;
        let mut delay = Duration::from_secs(1);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(8));
            }

            let mut req = self.client.post(&self.url).json(request);

            if let Some(ref api_key) = self.config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: CompletionResponse = response.json().await?;
                        return body.choices.into_iter().next().ok_or_else(|| {
                            TaskEvalError::ApiError("No choices in response".to_string())
                        });
                    }

                    if status.as_u16() == 429 {
                        last_error = Some(TaskEvalError::RateLimited(delay.as_secs()));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    return Err(TaskEvalError::ApiError(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(TaskEvalError::Timeout(self.config.timeout_seconds));
                        continue;
                    }
                    last_error = Some(TaskEvalError::HttpError(e));
                }
            }
        }

        Err(TaskEvalError::MaxRetriesExceeded(
            self.config.max_retries,
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl LanguageModel for OpenAICompletions {
    async fn loglikelihood(&self, context: &str, continuation: &str) -> Result<(f64, bool)> {
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: format!("{}{}", context, continuation),
            max_tokens: 0,
            temperature: 0.0,
            logprobs: Some(1),
            echo: Some(true),
            stop: None,
            seed: Some(self.config.seed),
        };

        let choice = self.send(&request).await?;
        let logprobs = choice
            .logprobs
            .ok_or_else(|| TaskEvalError::ApiError("No logprobs in response".to_string()))?;

        // Continuation tokens are the echoed tokens starting at or after the
        // end of the context. text_offset counts characters, not bytes.
        let context_chars = context.chars().count();
        let start = logprobs
            .text_offset
            .iter()
            .position(|offset| *offset >= context_chars)
            .ok_or_else(|| {
                TaskEvalError::ApiError("No continuation tokens in response".to_string())
            })?;

        let mut logprob = 0.0;
        let mut is_greedy = true;
        for i in start..logprobs.token_logprobs.len() {
            let token_logprob = logprobs.token_logprobs[i].ok_or_else(|| {
                TaskEvalError::ApiError("Missing continuation logprob".to_string())
            })?;
            logprob += token_logprob;

            if let Some(Some(top)) = logprobs.top_logprobs.get(i) {
                let best = top.values().cloned().fold(f64::NEG_INFINITY, f64::max);
                if token_logprob < best {
                    is_greedy = false;
                }
            }
        }

        debug!(logprob, is_greedy, "scored continuation");
        Ok((logprob, is_greedy))
    }

    async fn greedy_until(&self, context: &str, until: &[String]) -> Result<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: context.to_string(),
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            logprobs: None,
            echo: None,
            stop: if until.is_empty() {
                None
            } else {
                Some(until.to_vec())
            },
            seed: Some(self.config.seed),
        };

        let choice = self.send(&request).await?;
        debug!(chars = choice.text.len(), "generated completion");
        Ok(choice.text)
    }
}
