//! The evaluation loop: documents to requests to results to metrics.
//!
//! Documents are processed strictly in order, one fully scored before the
//! next; the only state carried across documents is the append-only metric
//! accumulator and the running task hash.

use crate::error::{Result, TaskEvalError};
use crate::models::LanguageModel;
use crate::task::{fewshot_context, MetricValue, RequestResult, Task};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, info};

/// Per-run knobs shared by every task.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub num_fewshot: usize,
    pub max_samples: Option<usize>,
    pub log_samples: bool,
}

/// Per-document record kept when sample logging is on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedSample {
    pub doc_id: usize,
    pub context: String,
    pub target: String,
    pub results: Vec<RequestResult>,
    pub scores: BTreeMap<String, f64>,
}

/// Result from running a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: String,
    pub task_hash: String,
    pub metrics: BTreeMap<String, f64>,
    pub num_samples: usize,
    pub elapsed: f64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub samples: Vec<LoggedSample>,
}

/// Pick the evaluation split: test if declared, else validation. A task
/// declaring neither is a configuration error.
fn eval_docs(task: &dyn Task) -> Result<Vec<crate::task::Document>> {
    if task.has_test_docs() {
        task.test_docs()
    } else if task.has_validation_docs() {
        task.validation_docs()
    } else {
        Err(TaskEvalError::NoEvalDocs(task.name().to_string()))
    }
}

/// Run a task against a model and return aggregated results.
pub async fn run_task(
    task: &dyn Task,
    model: &dyn LanguageModel,
    opts: &RunOptions,
) -> Result<TaskResult> {
    let start = Instant::now();

    let mut docs = eval_docs(task)?;
    if let Some(limit) = opts.max_samples {
        docs.truncate(limit);
    }

    let aggregation = task.aggregation();
    let higher_is_better = task.higher_is_better();
    if aggregation.len() != higher_is_better.len()
        || aggregation.keys().any(|k| !higher_is_better.contains_key(k))
    {
        return Err(TaskEvalError::MetricKeyMismatch(
            "higher_is_better".to_string(),
        ));
    }

    let mut accumulator: HashMap<String, Vec<MetricValue>> = aggregation
        .keys()
        .map(|name| (name.clone(), Vec::new()))
        .collect();
    let mut hasher = Sha256::new();
    let mut samples = Vec::new();

    for (doc_id, doc) in docs.iter().enumerate() {
        let context = fewshot_context(task, doc, opts.num_fewshot)?;
        let target = task.doc_to_target(doc)?;
        hasher.update(context.as_bytes());
        hasher.update(target.as_bytes());

        let requests = task.construct_requests(doc, &context)?;
        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            results.push(model.run(request).await?);
        }

        let scores = task.process_results(doc, &results)?;
        if scores.len() != accumulator.len() {
            return Err(TaskEvalError::MetricKeyMismatch("aggregation".to_string()));
        }

        if opts.log_samples {
            let scalar_scores: BTreeMap<String, f64> = scores
                .iter()
                .filter_map(|(name, value)| match value {
                    MetricValue::Scalar(s) => Some((name.clone(), *s)),
                    MetricValue::Pairs(_) => None,
                })
                .collect();
            samples.push(LoggedSample {
                doc_id,
                context: context.clone(),
                target: target.clone(),
                results: results.clone(),
                scores: scalar_scores,
            });
        }

        for (name, value) in scores {
            accumulator
                .get_mut(&name)
                .ok_or_else(|| TaskEvalError::MetricKeyMismatch("aggregation".to_string()))?
                .push(value);
        }
        debug!(task = task.name(), doc_id, "scored document");
    }

    let mut metrics = BTreeMap::new();
    for (name, reduce) in &aggregation {
        let values = &accumulator[name];
        metrics.insert(name.clone(), reduce(values)?);
    }

    let result = TaskResult {
        task: task.name().to_string(),
        task_hash: format!("{:x}", hasher.finalize()),
        metrics,
        num_samples: docs.len(),
        elapsed: start.elapsed().as_secs_f64(),
        samples,
    };
    info!(
        task = task.name(),
        num_samples = result.num_samples,
        "task complete"
    );
    Ok(result)
}
