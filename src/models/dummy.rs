//! Offline stand-in model for smoke runs and tests.

use crate::error::Result;
use crate::models::{LanguageModel, ModelConfig};
use async_trait::async_trait;

/// Deterministic no-network model: scores every continuation by its length
/// and generates nothing.
pub struct DummyLM;

/// Factory for the model registry.
pub fn dummy(_config: &ModelConfig) -> Result<Box<dyn LanguageModel>> {
    Ok(Box::new(DummyLM))
}

#[async_trait]
impl LanguageModel for DummyLM {
    async fn loglikelihood(&self, _context: &str, continuation: &str) -> Result<(f64, bool)> {
        Ok((-(continuation.chars().count() as f64), false))
    }

    async fn greedy_until(&self, _context: &str, _until: &[String]) -> Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Request, RequestResult};

    #[tokio::test]
    async fn test_dummy_is_deterministic() {
        let model = DummyLM;
        let first = model.loglikelihood("ctx", " FAVOR").await.unwrap();
        let second = model.loglikelihood("ctx", " FAVOR").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0, -6.0);
        assert!(!first.1);
    }

    #[tokio::test]
    async fn test_run_dispatches_by_kind() {
        let model = DummyLM;
        let ll = model
            .run(&Request::loglikelihood("ctx", " A"))
            .await
            .unwrap();
        assert!(matches!(ll, RequestResult::Loglikelihood { .. }));

        let gen = model.run(&Request::greedy_until("ctx", &["\n"])).await.unwrap();
        assert_eq!(gen, RequestResult::Generation(String::new()));
    }
}
