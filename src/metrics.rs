//! Aggregation functions for per-document metric values.
//!
//! Scalar metrics reduce with [`mean`]; label-pair metrics pool the
//! (reference, prediction) pairs of every document and macro-average over the
//! unique predicted labels.

use crate::error::{Result, TaskEvalError};
use crate::task::MetricValue;
use std::collections::BTreeSet;

/// Mean of scalar values; 0.0 for an empty sequence.
pub fn mean(values: &[MetricValue]) -> Result<f64> {
    if values.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0;
    for value in values {
        match value {
            MetricValue::Scalar(s) => total += s,
            MetricValue::Pairs(_) => return Err(TaskEvalError::MetricInput("scalar")),
        }
    }
    Ok(total / values.len() as f64)
}

/// Macro-averaged precision over pooled label pairs.
pub fn macro_precision(values: &[MetricValue]) -> Result<f64> {
    macro_average(values, |counts| counts.precision())
}

/// Macro-averaged recall over pooled label pairs.
pub fn macro_recall(values: &[MetricValue]) -> Result<f64> {
    macro_average(values, |counts| counts.recall())
}

/// Macro-averaged F1 over pooled label pairs.
pub fn macro_f1(values: &[MetricValue]) -> Result<f64> {
    macro_average(values, |counts| counts.f1())
}

struct LabelCounts {
    tp: usize,
    pred: usize,
    gold: usize,
}

impl LabelCounts {
    fn precision(&self) -> f64 {
        ratio(self.tp, self.pred)
    }

    fn recall(&self) -> f64 {
        ratio(self.tp, self.gold)
    }

    fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

fn pooled_pairs(values: &[MetricValue]) -> Result<Vec<(String, String)>> {
    let mut pooled = Vec::new();
    for value in values {
        match value {
            MetricValue::Pairs(pairs) => pooled.extend(pairs.iter().cloned()),
            MetricValue::Scalar(_) => return Err(TaskEvalError::MetricInput("label pair")),
        }
    }
    Ok(pooled)
}

/// Compute a per-label statistic for each label observed in the predictions
/// and average over that label set.
fn macro_average<F>(values: &[MetricValue], stat: F) -> Result<f64>
where
    F: Fn(&LabelCounts) -> f64,
{
    let pairs = pooled_pairs(values)?;
    if pairs.is_empty() {
        return Ok(0.0);
    }

    // Label set follows the predictions, matching macro averaging over the
    // observed prediction labels. BTreeSet keeps iteration deterministic.
    let labels: BTreeSet<&str> = pairs.iter().map(|(_, pred)| pred.as_str()).collect();

    let mut total = 0.0;
    for label in &labels {
        let counts = LabelCounts {
            tp: pairs
                .iter()
                .filter(|(gold, pred)| gold == label && pred == label)
                .count(),
            pred: pairs.iter().filter(|(_, pred)| pred == label).count(),
            gold: pairs.iter().filter(|(gold, _)| gold == label).count(),
        };
        total += stat(&counts);
    }
    Ok(total / labels.len() as f64)
}
