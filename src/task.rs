//! The task contract: documents, scoring requests, results, and aggregation.
//!
//! A [`Task`] describes one evaluation dataset end to end: which splits it
//! offers, how a document is rendered into a prompt/target pair, which
//! requests score a document, and how per-document scores reduce to
//! corpus-level metrics. The harness drives tasks through this trait only.

use crate::error::{Result, TaskEvalError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One dataset record. Adapters read fields by name; a missing or
/// wrongly-typed field is a fatal configuration error, never skipped.
pub type Document = Value;

/// Read a string field from a document.
pub fn doc_str<'a>(doc: &'a Document, field: &str) -> Result<&'a str> {
    let value = doc
        .get(field)
        .ok_or_else(|| TaskEvalError::MissingField(field.to_string()))?;
    value
        .as_str()
        .ok_or_else(|| TaskEvalError::FieldType(field.to_string()))
}

/// Read an integer field from a document.
pub fn doc_i64(doc: &Document, field: &str) -> Result<i64> {
    let value = doc
        .get(field)
        .ok_or_else(|| TaskEvalError::MissingField(field.to_string()))?;
    value
        .as_i64()
        .ok_or_else(|| TaskEvalError::FieldType(field.to_string()))
}

/// Read a string-array field from a document.
pub fn doc_str_vec(doc: &Document, field: &str) -> Result<Vec<String>> {
    let value = doc
        .get(field)
        .ok_or_else(|| TaskEvalError::MissingField(field.to_string()))?;
    let array = value
        .as_array()
        .ok_or_else(|| TaskEvalError::FieldType(field.to_string()))?;
    array
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| TaskEvalError::FieldType(field.to_string()))
        })
        .collect()
}

/// One unit of work for a language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    /// Score the log-likelihood of `continuation` given `context`.
    Loglikelihood { context: String, continuation: String },
    /// Greedily generate from `context` until any of the `until` strings.
    GreedyUntil { context: String, until: Vec<String> },
}

impl Request {
    pub fn loglikelihood(context: &str, continuation: &str) -> Self {
        Request::Loglikelihood {
            context: context.to_string(),
            continuation: continuation.to_string(),
        }
    }

    pub fn greedy_until(context: &str, until: &[&str]) -> Self {
        Request::GreedyUntil {
            context: context.to_string(),
            until: until.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// What a model returns for a [`Request`]; the variant matches the request
/// kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestResult {
    Loglikelihood { logprob: f64, is_greedy: bool },
    Generation(String),
}

impl RequestResult {
    /// Unpack a log-likelihood result, failing on a kind mismatch.
    pub fn as_loglikelihood(&self) -> Result<(f64, bool)> {
        match self {
            RequestResult::Loglikelihood { logprob, is_greedy } => Ok((*logprob, *is_greedy)),
            RequestResult::Generation(_) => {
                Err(TaskEvalError::ResultKind("expected loglikelihood".to_string()))
            }
        }
    }

    /// Unpack a generation result, failing on a kind mismatch.
    pub fn as_generation(&self) -> Result<&str> {
        match self {
            RequestResult::Generation(text) => Ok(text),
            RequestResult::Loglikelihood { .. } => {
                Err(TaskEvalError::ResultKind("expected generation".to_string()))
            }
        }
    }
}

/// One per-document score: either a scalar, or (reference, prediction) label
/// pairs destined for a batched corpus-level metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar(f64),
    Pairs(Vec<(String, String)>),
}

/// Reduces the accumulated per-document values of one metric to a scalar.
/// Must not mutate its input; applying it twice gives the same answer.
pub type AggregationFn = Box<dyn Fn(&[MetricValue]) -> Result<f64> + Send + Sync>;

/// One evaluation dataset.
///
/// Implementations must keep the key sets of [`Task::process_results`],
/// [`Task::aggregation`], and [`Task::higher_is_better`] identical; the
/// harness checks this per document and fails fast on a mismatch.
/// `construct_requests` and `process_results` are a matched pair: results
/// arrive in the same order and kind as the requests were emitted.
pub trait Task: Send + Sync {
    /// Registry key and reporting name.
    fn name(&self) -> &'static str;

    fn has_training_docs(&self) -> bool;
    fn has_validation_docs(&self) -> bool;
    fn has_test_docs(&self) -> bool;

    /// Documents of the training split; empty when the split is absent.
    fn training_docs(&self) -> Result<Vec<Document>>;

    fn validation_docs(&self) -> Result<Vec<Document>> {
        Ok(Vec::new())
    }

    fn test_docs(&self) -> Result<Vec<Document>> {
        Ok(Vec::new())
    }

    /// Render the query portion of a document. Deterministic, no side effects.
    fn doc_to_text(&self, doc: &Document) -> Result<String>;

    /// Render the gold answer, prefixed with a single separating space so
    /// `doc_to_text(doc) + doc_to_target(doc)` is a well-formed example.
    fn doc_to_target(&self, doc: &Document) -> Result<String>;

    /// Emit the request(s) that score one document given its assembled
    /// context. Pure function of (doc, ctx).
    fn construct_requests(&self, doc: &Document, ctx: &str) -> Result<Vec<Request>>;

    /// Convert the results for this document's requests into one value per
    /// declared metric.
    fn process_results(
        &self,
        doc: &Document,
        results: &[RequestResult],
    ) -> Result<HashMap<String, MetricValue>>;

    /// Per-metric reduction across all documents.
    fn aggregation(&self) -> HashMap<String, AggregationFn>;

    /// Per-metric polarity for reporting and model selection.
    fn higher_is_better(&self) -> HashMap<String, bool>;
}

/// Assemble the few-shot context for a document: the first `num_fewshot`
/// training examples rendered as text+target, blank-line separated, followed
/// by the document's own query text.
pub fn fewshot_context(task: &dyn Task, doc: &Document, num_fewshot: usize) -> Result<String> {
    let query = task.doc_to_text(doc)?;
    if num_fewshot == 0 || !task.has_training_docs() {
        return Ok(query);
    }

    let train = task.training_docs()?;
    let mut parts = Vec::with_capacity(num_fewshot + 1);
    for example in train.iter().take(num_fewshot) {
        parts.push(format!(
            "{}{}",
            task.doc_to_text(example)?,
            task.doc_to_target(example)?
        ));
    }
    parts.push(query);
    Ok(parts.join("\n\n"))
}
