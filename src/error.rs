//! Error types for taskeval

use thiserror::Error;

/// Main error type for taskeval
#[derive(Error, Debug)]
pub enum TaskEvalError {
    #[error("Unknown task: {0}. Available tasks: {1}")]
    UnknownTask(String, String),

    #[error("Unknown model: {0}. Available models: {1}")]
    UnknownModel(String, String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Document field {0} has unexpected type")]
    FieldType(String),

    #[error("Expected {expected} results but got {got}")]
    ResultArity { expected: usize, got: usize },

    #[error("Unexpected result kind: {0}")]
    ResultKind(String),

    #[error("Metric keys disagree between process_results and {0}")]
    MetricKeyMismatch(String),

    #[error("Aggregation function expected {0} values")]
    MetricInput(&'static str),

    #[error("Task {0} declares no evaluation split")]
    NoEvalDocs(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid model args: {0}")]
    InvalidModelArgs(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Rate limited by API, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Max retries ({0}) exceeded: {1}")]
    MaxRetriesExceeded(u32, String),
}

/// Result type alias for taskeval
pub type Result<T> = std::result::Result<T, TaskEvalError>;
