//! German legal entity recognition - NER tagging over court decisions.
//!
//! The model greedily generates one line of whitespace-separated BIO tags for
//! a tokenized sentence. Predicted sequences are aligned to the gold tags
//! token by token, padding short predictions with `O`.

use crate::error::{Result, TaskEvalError};
use crate::metrics;
use crate::task::{
    doc_str_vec, AggregationFn, Document, MetricValue, Request, RequestResult, Task,
};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;

/// Regex for pulling BIO tags out of a generated line
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[BI]-[A-Z]+|\bO\b").unwrap());

/// Sample annotated sentences (embedded for standalone operation)
/// In production, these would be loaded from the published CoNLL files
const GERMAN_LER_TRAIN_SAMPLES: &[(i64, &[&str], &[&str])] = &[
    (
        1,
        &["Das", "Bundesverfassungsgericht", "wies", "die", "Beschwerde", "zurück", "."],
        &["O", "B-GRT", "O", "O", "O", "O", "O"],
    ),
    (
        2,
        &["Richter", "Meier", "verkündete", "das", "Urteil", "in", "Karlsruhe", "."],
        &["B-RR", "I-RR", "O", "O", "O", "O", "B-ST", "O"],
    ),
    (
        3,
        &["Nach", "§", "242", "BGB", "ist", "die", "Klage", "unbegründet", "."],
        &["O", "B-GS", "I-GS", "I-GS", "O", "O", "O", "O", "O"],
    ),
    (
        4,
        &["Der", "Bundesgerichtshof", "folgte", "dem", "Antrag", "des", "Klägers", "."],
        &["O", "B-GRT", "O", "O", "O", "O", "O", "O"],
    ),
];

const GERMAN_LER_TEST_SAMPLES: &[(i64, &[&str], &[&str])] = &[
    (
        11,
        &["Das", "Bundesarbeitsgericht", "hob", "das", "Urteil", "auf", "."],
        &["O", "B-GRT", "O", "O", "O", "O", "O"],
    ),
    (
        12,
        &["Die", "Revision", "stützt", "sich", "auf", "§", "543", "ZPO", "."],
        &["O", "O", "O", "O", "O", "B-GS", "I-GS", "I-GS", "O"],
    ),
    (
        13,
        &["Rechtsanwältin", "Schmidt", "vertrat", "die", "Beklagte", "."],
        &["B-AN", "I-AN", "O", "O", "O", "O"],
    ),
    (
        14,
        &["Der", "Senat", "verwies", "die", "Sache", "nach", "Erfurt", "zurück", "."],
        &["O", "B-GRT", "O", "O", "O", "O", "B-ST", "O", "O"],
    ),
];

fn build_docs(samples: &[(i64, &[&str], &[&str])]) -> Vec<Document> {
    samples
        .iter()
        .map(|(id, tokens, tags)| {
            json!({
                "id": id,
                "tokens": tokens,
                "ner_tags": tags,
            })
        })
        .collect()
}

pub struct GermanLer {
    training: OnceCell<Vec<Document>>,
}

/// Create the German LER task
pub fn german_ler() -> Box<dyn Task> {
    Box::new(GermanLer {
        training: OnceCell::new(),
    })
}

/// Align a predicted tag line to the gold length, padding with `O`.
fn parse_tags(generated: &str, len: usize) -> Vec<String> {
    let mut tags: Vec<String> = TAG_RE
        .find_iter(generated)
        .take(len)
        .map(|m| m.as_str().to_string())
        .collect();
    tags.resize(len, "O".to_string());
    tags
}

impl Task for GermanLer {
    fn name(&self) -> &'static str {
        "german_ler"
    }

    fn has_training_docs(&self) -> bool {
        true
    }

    fn has_validation_docs(&self) -> bool {
        false
    }

    fn has_test_docs(&self) -> bool {
        true
    }

    fn training_docs(&self) -> Result<Vec<Document>> {
        Ok(self
            .training
            .get_or_init(|| build_docs(GERMAN_LER_TRAIN_SAMPLES))
            .clone())
    }

    fn test_docs(&self) -> Result<Vec<Document>> {
        Ok(build_docs(GERMAN_LER_TEST_SAMPLES))
    }

    fn doc_to_text(&self, doc: &Document) -> Result<String> {
        Ok(format!(
            "tokens: {}\n\nNER tags:",
            doc_str_vec(doc, "tokens")?.join(" ")
        ))
    }

    fn doc_to_target(&self, doc: &Document) -> Result<String> {
        Ok(format!(" {}", doc_str_vec(doc, "ner_tags")?.join(" ")))
    }

    fn construct_requests(&self, _doc: &Document, ctx: &str) -> Result<Vec<Request>> {
        // One bounded generation per document; the tag line ends at the
        // first newline.
        Ok(vec![Request::greedy_until(ctx, &["\n"])])
    }

    fn process_results(
        &self,
        doc: &Document,
        results: &[RequestResult],
    ) -> Result<HashMap<String, MetricValue>> {
        if results.len() != 1 {
            return Err(TaskEvalError::ResultArity {
                expected: 1,
                got: results.len(),
            });
        }
        let generated = results[0].as_generation()?;

        let gold = doc_str_vec(doc, "ner_tags")?;
        let predicted = parse_tags(generated, gold.len());

        let exact = if predicted == gold { 1.0 } else { 0.0 };
        let pairs: Vec<(String, String)> = gold.into_iter().zip(predicted).collect();

        Ok(HashMap::from([
            ("acc".to_string(), MetricValue::Scalar(exact)),
            ("precision".to_string(), MetricValue::Pairs(pairs.clone())),
            ("recall".to_string(), MetricValue::Pairs(pairs.clone())),
            ("f1".to_string(), MetricValue::Pairs(pairs)),
        ]))
    }

    fn aggregation(&self) -> HashMap<String, AggregationFn> {
        HashMap::from([
            ("acc".to_string(), Box::new(metrics::mean) as AggregationFn),
            (
                "precision".to_string(),
                Box::new(metrics::macro_precision) as AggregationFn,
            ),
            (
                "recall".to_string(),
                Box::new(metrics::macro_recall) as AggregationFn,
            ),
            ("f1".to_string(), Box::new(metrics::macro_f1) as AggregationFn),
        ])
    }

    fn higher_is_better(&self) -> HashMap<String, bool> {
        HashMap::from([
            ("acc".to_string(), true),
            ("precision".to_string(), true),
            ("recall".to_string(), true),
            ("f1".to_string(), true),
        ])
    }
}
