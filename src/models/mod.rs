//! Model adapters and the model registry.

pub mod dummy;
pub mod openai;

use crate::error::{Result, TaskEvalError};
use crate::task::{Request, RequestResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A model that can execute scoring requests.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Log-likelihood of `continuation` given `context`, plus whether the
    /// continuation is the model's greedy completion.
    async fn loglikelihood(&self, context: &str, continuation: &str) -> Result<(f64, bool)>;

    /// Greedy generation from `context` until any of the `until` strings.
    async fn greedy_until(&self, context: &str, until: &[String]) -> Result<String>;

    /// Dispatch one request to the matching operation.
    async fn run(&self, request: &Request) -> Result<RequestResult> {
        match request {
            Request::Loglikelihood {
                context,
                continuation,
            } => {
                let (logprob, is_greedy) = self.loglikelihood(context, continuation).await?;
                Ok(RequestResult::Loglikelihood { logprob, is_greedy })
            }
            Request::GreedyUntil { context, until } => {
                let text = self.greedy_until(context, until).await?;
                Ok(RequestResult::Generation(text))
            }
        }
    }
}

/// Model configuration, parsed from a `key=value` argument list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub seed: u64,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub max_tokens: u32,
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            seed: 42,
            timeout_seconds: 120,
            max_retries: 3,
            max_tokens: 256,
            api_key: None,
        }
    }
}

impl ModelConfig {
    /// Parse from `key=value` format string.
    pub fn from_model_args(args: &str) -> Result<Self> {
        let mut config = ModelConfig::default();

        for part in args.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part.split_once('=').ok_or_else(|| {
                TaskEvalError::InvalidModelArgs(format!("Invalid format: {}", part))
            })?;
            let value = value.trim();

            match key.trim() {
                "base_url" => config.base_url = Some(value.to_string()),
                "model" => config.model = Some(value.to_string()),
                "seed" => {
                    config.seed = value.parse().map_err(|_| {
                        TaskEvalError::ParseError(format!("Invalid seed: {}", value))
                    })?
                }
                "timeout" => {
                    config.timeout_seconds = value.parse().map_err(|_| {
                        TaskEvalError::ParseError(format!("Invalid timeout: {}", value))
                    })?
                }
                "max_retries" => {
                    config.max_retries = value.parse().map_err(|_| {
                        TaskEvalError::ParseError(format!("Invalid max_retries: {}", value))
                    })?
                }
                "max_tokens" => {
                    config.max_tokens = value.parse().map_err(|_| {
                        TaskEvalError::ParseError(format!("Invalid max_tokens: {}", value))
                    })?
                }
                "api_key" => config.api_key = Some(value.to_string()),
                _ => {} // Ignore unknown keys
            }
        }

        Ok(config)
    }
}

/// Model factory function type
pub type ModelFactory = fn(&ModelConfig) -> Result<Box<dyn LanguageModel>>;

/// Registry of available models
static MODEL_REGISTRY: Lazy<HashMap<&'static str, ModelFactory>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, ModelFactory> = HashMap::new();
    m.insert("openai", openai::openai);
    m.insert("dummy", dummy::dummy);
    m
});

/// Resolve a model name to its factory.
pub fn get_model(name: &str) -> Result<ModelFactory> {
    MODEL_REGISTRY.get(name).copied().ok_or_else(|| {
        let available: Vec<&str> = MODEL_REGISTRY.keys().copied().collect();
        TaskEvalError::UnknownModel(name.to_string(), available.join(", "))
    })
}

/// Get all available model names
pub fn available_models() -> Vec<&'static str> {
    MODEL_REGISTRY.keys().copied().collect()
}
