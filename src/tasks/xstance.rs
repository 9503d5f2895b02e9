//! X-Stance evaluation - multilingual stance detection on political comments.
//!
//! Each document pairs a political question with a candidate's comment; the
//! model is scored on the log-likelihood of the FAVOR and AGAINST labels and
//! the prediction is the argmax of the two.

use crate::error::{Result, TaskEvalError};
use crate::metrics;
use crate::task::{
    doc_i64, doc_str, AggregationFn, Document, MetricValue, Request, RequestResult, Task,
};
use once_cell::sync::OnceCell;
use serde_json::json;
use std::collections::HashMap;

/// Sample x-stance records (embedded for standalone operation)
/// In production, these would be loaded from the published dataset
const XSTANCE_TRAIN_SAMPLES: &[(i64, &str, &str, &str, i64)] = &[
    (
        101,
        "Befürworten Sie eine Erhöhung des Rentenalters?",
        "Die Lebenserwartung steigt seit Jahren, die Finanzierung der Altersvorsorge muss Schritt halten.",
        "FAVOR",
        1,
    ),
    (
        102,
        "Soll der Treibstoffpreis zugunsten des Klimaschutzes erhöht werden?",
        "Eine weitere Abgabe trifft vor allem die Landbevölkerung, die auf das Auto angewiesen ist.",
        "AGAINST",
        0,
    ),
    (
        103,
        "Soll Werbung für Tabakprodukte weiter eingeschränkt werden?",
        "Der Jugendschutz muss klar vor den Interessen der Werbebranche stehen.",
        "FAVOR",
        1,
    ),
    (
        104,
        "Befürworten Sie strengere Auflagen für den Finanzplatz?",
        "Zusätzliche Regulierung schwächt die Wettbewerbsfähigkeit und kostet Arbeitsplätze.",
        "AGAINST",
        0,
    ),
    (
        105,
        "Soll der öffentliche Verkehr stärker subventioniert werden?",
        "Gute und bezahlbare Verbindungen sind die Voraussetzung für die Verlagerung von der Strasse.",
        "FAVOR",
        1,
    ),
    (
        106,
        "Soll die Armee weiter verkleinert werden?",
        "Die sicherheitspolitische Lage erlaubt keinen weiteren Abbau unserer Verteidigungsfähigkeit.",
        "AGAINST",
        0,
    ),
];

const XSTANCE_VALIDATION_SAMPLES: &[(i64, &str, &str, &str, i64)] = &[
    (
        201,
        "Befürworten Sie ein generelles Werbeverbot für Alkohol?",
        "Mündige Konsumentinnen und Konsumenten brauchen keine weiteren Verbote.",
        "AGAINST",
        0,
    ),
    (
        202,
        "Soll der Mindestumwandlungssatz in der beruflichen Vorsorge gesenkt werden?",
        "Ohne Anpassung an die Realität der Kapitalmärkte ist die zweite Säule nicht zu sichern.",
        "FAVOR",
        1,
    ),
    (
        203,
        "Soll die Schweiz ein Rahmenabkommen mit der EU abschliessen?",
        "Der bilaterale Weg braucht eine stabile rechtliche Grundlage.",
        "FAVOR",
        1,
    ),
];

const XSTANCE_TEST_SAMPLES: &[(i64, &str, &str, &str, i64)] = &[
    (
        301,
        "Soll Cannabis legalisiert werden?",
        "Die Prohibition ist gescheitert; Regulierung schützt Jugendliche besser als der Schwarzmarkt.",
        "FAVOR",
        1,
    ),
    (
        302,
        "Befürworten Sie die Einführung einer nationalen Erbschaftssteuer?",
        "Das Familiengewerbe würde bei jeder Nachfolge erneut zur Kasse gebeten.",
        "AGAINST",
        0,
    ),
    (
        303,
        "Soll der Ausbau erneuerbarer Energien beschleunigt werden?",
        "Die Versorgungssicherheit verlangt einen raschen Zubau von Sonne und Wind.",
        "FAVOR",
        1,
    ),
    (
        304,
        "Soll das Stimmrechtsalter auf 16 Jahre gesenkt werden?",
        "Politische Rechte und zivilrechtliche Mündigkeit gehören zusammen.",
        "AGAINST",
        0,
    ),
    (
        305,
        "Befürworten Sie höhere Hürden für Volksinitiativen?",
        "Die direkte Demokratie lebt von tiefen Hürden; daran ist nicht zu rütteln.",
        "AGAINST",
        0,
    ),
    (
        306,
        "Soll die Individualbesteuerung eingeführt werden?",
        "Die Heiratsstrafe gehört endlich abgeschafft.",
        "FAVOR",
        1,
    ),
];

fn build_docs(samples: &[(i64, &str, &str, &str, i64)]) -> Vec<Document> {
    samples
        .iter()
        .map(|(id, question, comment, label, numerical_label)| {
            json!({
                "id": id,
                "question": question,
                "comment": comment,
                "label": label,
                "numerical_label": numerical_label,
            })
        })
        .collect()
}

pub struct XStance {
    // Training docs are re-read for every few-shot context; cache them once.
    training: OnceCell<Vec<Document>>,
}

/// Create the x-stance task
pub fn xstance() -> Box<dyn Task> {
    Box::new(XStance {
        training: OnceCell::new(),
    })
}

impl Task for XStance {
    fn name(&self) -> &'static str {
        "xstance"
    }

    fn has_training_docs(&self) -> bool {
        true
    }

    fn has_validation_docs(&self) -> bool {
        true
    }

    fn has_test_docs(&self) -> bool {
        true
    }

    fn training_docs(&self) -> Result<Vec<Document>> {
        Ok(self
            .training
            .get_or_init(|| build_docs(XSTANCE_TRAIN_SAMPLES))
            .clone())
    }

    fn validation_docs(&self) -> Result<Vec<Document>> {
        Ok(build_docs(XSTANCE_VALIDATION_SAMPLES))
    }

    fn test_docs(&self) -> Result<Vec<Document>> {
        Ok(build_docs(XSTANCE_TEST_SAMPLES))
    }

    fn doc_to_text(&self, doc: &Document) -> Result<String> {
        Ok(format!(
            "QUESTION: {}\n\nCOMMENT: {}\n\nLABEL:",
            doc_str(doc, "question")?,
            doc_str(doc, "comment")?
        ))
    }

    fn doc_to_target(&self, doc: &Document) -> Result<String> {
        Ok(format!(" {}", doc_str(doc, "label")?))
    }

    fn construct_requests(&self, _doc: &Document, ctx: &str) -> Result<Vec<Request>> {
        Ok(vec![
            Request::loglikelihood(ctx, " FAVOR"),
            Request::loglikelihood(ctx, " AGAINST"),
        ])
    }

    fn process_results(
        &self,
        doc: &Document,
        results: &[RequestResult],
    ) -> Result<HashMap<String, MetricValue>> {
        if results.len() != 2 {
            return Err(TaskEvalError::ResultArity {
                expected: 2,
                got: results.len(),
            });
        }
        let (ll_favor, _) = results[0].as_loglikelihood()?;
        let (ll_against, _) = results[1].as_loglikelihood()?;

        let pred: i64 = if ll_favor > ll_against { 1 } else { 0 };
        let gold = doc_i64(doc, "numerical_label")?;

        Ok(HashMap::from([
            (
                "acc".to_string(),
                MetricValue::Scalar(if pred == gold { 1.0 } else { 0.0 }),
            ),
            (
                "precision".to_string(),
                MetricValue::Pairs(vec![(gold.to_string(), pred.to_string())]),
            ),
        ]))
    }

    fn aggregation(&self) -> HashMap<String, AggregationFn> {
        HashMap::from([
            ("acc".to_string(), Box::new(metrics::mean) as AggregationFn),
            (
                "precision".to_string(),
                Box::new(metrics::macro_precision) as AggregationFn,
            ),
        ])
    }

    fn higher_is_better(&self) -> HashMap<String, bool> {
        HashMap::from([("acc".to_string(), true), ("precision".to_string(), true)])
    }
}
