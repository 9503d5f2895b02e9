//! End-to-end tests for the taskeval CLI

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

/// Completions responder that echoes the prompt back with logprobs favoring
/// the FAVOR continuation, so stance predictions are deterministic.
struct FavorLogprobs;

impl Respond for FavorLogprobs {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let prompt = body["prompt"].as_str().unwrap();

        let (token, logprob) = if prompt.ends_with(" FAVOR") {
            (" FAVOR", -0.5)
        } else {
            (" AGAINST", -3.0)
        };
        // text_offset is character-based, as the APIs serving this format
        // report it.
        let offset = prompt.chars().count() - token.chars().count();

        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "text": prompt,
                "logprobs": {
                    "tokens": [token],
                    "token_logprobs": [logprob],
                    "text_offset": [offset],
                    "top_logprobs": [{" FAVOR": -0.5}]
                }
            }]
        }))
    }
}

/// Fixed generation response for the tagging task.
fn mock_generation_response(text: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "text": text,
            "logprobs": null
        }]
    })
}

#[tokio::test]
async fn test_xstance_evaluation_outputs_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(FavorLogprobs)
        .expect(6..) // 2 loglikelihood requests per document
        .mount(&mock_server)
        .await;

    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args([
        "--tasks",
        "xstance",
        "--model-args",
        &format!("model=test-model,base_url={}/v1", mock_server.uri()),
        "--num-fewshot",
        "1",
        "--max-samples",
        "3",
    ]);

    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    let result: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");

    assert!(result.get("results").is_some());
    assert!(result.get("total_seconds").is_some());
    assert!(result.get("config").is_some());

    let xstance = &result["results"]["xstance"];
    assert!(xstance.get("task_hash").is_some());
    assert_eq!(xstance["num_samples"], 3);
    assert_eq!(xstance["higher_is_better"]["acc"], true);

    // Test documents 1-3 are FAVOR, AGAINST, FAVOR; a model favoring FAVOR
    // gets 2 of 3 right.
    let acc = xstance["metrics"]["acc"].as_f64().unwrap();
    assert!((acc - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_german_ler_generation_scores_exact_match() {
    let mock_server = MockServer::start().await;

    // The first test sentence is tagged O B-GRT O O O O O.
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(mock_generation_response(" O B-GRT O O O O O")),
        )
        .expect(1..)
        .mount(&mock_server)
        .await;

    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args([
        "--tasks",
        "german_ler",
        "--model-args",
        &format!("model=test-model,base_url={}/v1", mock_server.uri()),
        "--max-samples",
        "1",
    ]);

    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    let result: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");

    let metrics = &result["results"]["german_ler"]["metrics"];
    assert_eq!(metrics["acc"], 1.0);
    assert_eq!(metrics["precision"], 1.0);
    assert_eq!(metrics["recall"], 1.0);
    assert_eq!(metrics["f1"], 1.0);
}

#[test]
fn test_invalid_task_raises_error() {
    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args([
        "--tasks",
        "nonexistent_task",
        "--model-args",
        "model=test,base_url=http://localhost:8000/v1",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown task"));
}

#[test]
fn test_unknown_model_raises_error() {
    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args([
        "--tasks",
        "xstance",
        "--model",
        "nonexistent_model",
        "--model-args",
        "model=test,base_url=http://localhost:8000/v1",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown model"));
}

#[test]
fn test_dummy_model_runs_offline() {
    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args(["--tasks", "xstance", "--model", "dummy"]);

    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    let result: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");

    // The dummy model scores by continuation length, so FAVOR always wins
    // and half of the six test documents come out right.
    let acc = result["results"]["xstance"]["metrics"]["acc"].as_f64().unwrap();
    assert!((acc - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_output_path_writes_results_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(FavorLogprobs)
        .expect(1..)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path();

    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args([
        "--tasks",
        "xstance",
        "--model-args",
        &format!("model=test-model,base_url={}/v1", mock_server.uri()),
        "--max-samples",
        "1",
        "--output-path",
        output_path.to_str().unwrap(),
    ]);

    cmd.assert().success();

    let results_file = output_path.join("results.json");
    assert!(results_file.exists(), "results.json should be created");

    let contents = fs::read_to_string(&results_file).unwrap();
    let result: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert!(result.get("results").is_some());
}

#[tokio::test]
async fn test_log_samples_writes_jsonl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(FavorLogprobs)
        .expect(1..)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path();

    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args([
        "--tasks",
        "xstance",
        "--model-args",
        &format!("model=test-model,base_url={}/v1", mock_server.uri()),
        "--max-samples",
        "2",
        "--output-path",
        output_path.to_str().unwrap(),
        "--log-samples",
    ]);

    cmd.assert().success();

    let jsonl_file = output_path.join("samples_xstance.jsonl");
    assert!(jsonl_file.exists(), "samples JSONL should be created");

    let contents = fs::read_to_string(&jsonl_file).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2, "Should have 2 sample lines");

    for line in lines {
        let sample: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(sample.get("doc_id").is_some());
        assert!(sample.get("context").is_some());
        assert!(sample.get("target").is_some());
        assert!(sample.get("results").is_some());
        assert!(sample["scores"].get("acc").is_some());
    }
}

#[tokio::test]
async fn test_seed_affects_reproducibility() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(FavorLogprobs)
        .expect(2..)
        .mount(&mock_server)
        .await;

    let run_with_seed = |seed: u64| {
        let mut cmd = Command::cargo_bin("taskeval").unwrap();
        cmd.args([
            "--tasks",
            "xstance",
            "--model-args",
            &format!("model=test-model,base_url={}/v1", mock_server.uri()),
            "--max-samples",
            "1",
            "--seed",
            &seed.to_string(),
        ]);
        cmd
    };

    let output1 = run_with_seed(42).output().unwrap();
    let output2 = run_with_seed(42).output().unwrap();

    let result1: serde_json::Value = serde_json::from_slice(&output1.stdout).unwrap();
    let result2: serde_json::Value = serde_json::from_slice(&output2.stdout).unwrap();

    assert_eq!(
        result1["results"]["xstance"]["task_hash"],
        result2["results"]["xstance"]["task_hash"]
    );
}

#[tokio::test]
async fn test_multiple_tasks() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(FavorLogprobs)
        .expect(2..)
        .mount(&mock_server)
        .await;

    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args([
        "--tasks",
        "xstance,german_ler",
        "--model-args",
        &format!("model=test-model,base_url={}/v1", mock_server.uri()),
        "--max-samples",
        "1",
    ]);

    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    let result: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");

    assert!(result["results"]["xstance"].is_object());
    assert!(result["results"]["german_ler"].is_object());
}

#[test]
fn test_missing_required_args() {
    // Missing --tasks
    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.args(["--model-args", "model=test,base_url=http://localhost:8000/v1"]);
    cmd.assert().failure();
}

#[test]
fn test_help_flag() {
    let mut cmd = Command::cargo_bin("taskeval").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--tasks"))
        .stdout(predicate::str::contains("--model-args"))
        .stdout(predicate::str::contains("--num-fewshot"));
}
