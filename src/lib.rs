//! taskeval - A minimal harness for evaluating LLMs on classification and
//! tagging tasks
//!
//! This crate provides:
//! - The task contract (Document, Request, RequestResult, the Task trait)
//! - Aggregation functions (mean, macro precision/recall/F1)
//! - The model registry and adapters (OpenAI-compatible APIs, offline dummy)
//! - The evaluation loop with SHA256 hashing for reproducibility
//! - Task implementations (x-stance, German LER)

pub mod error;
pub mod harness;
pub mod metrics;
pub mod models;
pub mod task;
pub mod tasks;

pub use crate::error::{Result, TaskEvalError};
pub use crate::harness::{run_task, LoggedSample, RunOptions, TaskResult};
pub use crate::models::{available_models, get_model, LanguageModel, ModelConfig};
pub use crate::task::{
    fewshot_context, AggregationFn, Document, MetricValue, Request, RequestResult, Task,
};
pub use crate::tasks::{available_tasks, get_task};
