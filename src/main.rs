//! taskeval - A minimal harness for evaluating LLMs on classification and
//! tagging tasks

mod error;
mod harness;
mod metrics;
mod models;
mod task;
mod tasks;

use crate::error::{Result, TaskEvalError};
use crate::harness::{run_task, LoggedSample, RunOptions, TaskResult};
use crate::models::ModelConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Evaluate LLMs on classification and tagging tasks
#[derive(Parser, Debug)]
#[command(name = "taskeval")]
#[command(version = "0.1.0")]
#[command(about = "Evaluate LLMs on classification and tagging tasks")]
struct Args {
    /// Comma-separated list of tasks to run
    #[arg(long, required = true)]
    tasks: String,

    /// Model adapter to use
    #[arg(long, default_value = "openai")]
    model: String,

    /// Model configuration: model=name,base_url=url[,seed=N,timeout=N,max_retries=N,max_tokens=N,api_key=key]
    #[arg(long, default_value = "")]
    model_args: String,

    /// Number of few-shot examples prepended to each document
    #[arg(long, default_value = "0")]
    num_fewshot: usize,

    /// Maximum documents per task
    #[arg(long)]
    max_samples: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Output directory for results
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// Log individual documents to JSONL files
    #[arg(long, default_value = "false")]
    log_samples: bool,
}

/// Overall evaluation results
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EvalResults {
    results: HashMap<String, TaskResultOutput>,
    total_seconds: f64,
    config: ConfigOutput,
}

/// Task result for output (without samples in main results)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskResultOutput {
    task: String,
    task_hash: String,
    metrics: std::collections::BTreeMap<String, f64>,
    higher_is_better: std::collections::BTreeMap<String, bool>,
    num_samples: usize,
    elapsed: f64,
}

/// Configuration output
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigOutput {
    model: String,
    num_fewshot: usize,
    max_samples: Option<usize>,
    seed: u64,
    tasks: Vec<String>,
}

/// Run evaluation for all specified tasks
async fn evaluate(args: &Args, task_names: &[String]) -> Result<EvalResults> {
    let start = Instant::now();

    let mut config = ModelConfig::from_model_args(&args.model_args)?;
    config.seed = args.seed;
    let factory = models::get_model(&args.model)?;
    let model = factory(&config)?;

    let opts = RunOptions {
        num_fewshot: args.num_fewshot,
        max_samples: args.max_samples,
        log_samples: args.log_samples,
    };

    let mut results: HashMap<String, TaskResultOutput> = HashMap::new();

    for task_name in task_names {
        let task = tasks::get_task(task_name)?;
        info!(task = task_name.as_str(), "running task");
        let result = run_task(task.as_ref(), model.as_ref(), &opts).await?;

        if args.log_samples {
            if let Some(ref path) = args.output_path {
                write_samples_jsonl(path, task_name, &result.samples)?;
            }
        }

        let higher_is_better = task.higher_is_better().into_iter().collect();
        results.insert(
            task_name.clone(),
            TaskResultOutput::from_result(&result, higher_is_better),
        );
    }

    let eval_results = EvalResults {
        results,
        total_seconds: start.elapsed().as_secs_f64(),
        config: ConfigOutput {
            model: args.model.clone(),
            num_fewshot: args.num_fewshot,
            max_samples: args.max_samples,
            seed: args.seed,
            tasks: task_names.to_vec(),
        },
    };

    if let Some(ref path) = args.output_path {
        write_results_json(path, &eval_results)?;
    }

    Ok(eval_results)
}

impl TaskResultOutput {
    fn from_result(
        result: &TaskResult,
        higher_is_better: std::collections::BTreeMap<String, bool>,
    ) -> Self {
        Self {
            task: result.task.clone(),
            task_hash: result.task_hash.clone(),
            metrics: result.metrics.clone(),
            higher_is_better,
            num_samples: result.num_samples,
            elapsed: result.elapsed,
        }
    }
}

/// Write results to JSON file
fn write_results_json(output_path: &PathBuf, results: &EvalResults) -> Result<()> {
    fs::create_dir_all(output_path)?;
    let file_path = output_path.join("results.json");
    let file = File::create(&file_path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, results)?;
    Ok(())
}

/// Write samples to JSONL file
fn write_samples_jsonl(
    output_path: &PathBuf,
    task_name: &str,
    samples: &[LoggedSample],
) -> Result<()> {
    fs::create_dir_all(output_path)?;
    let file_path = output_path.join(format!("samples_{}.jsonl", task_name));
    let file = File::create(&file_path)?;
    let mut writer = BufWriter::new(file);

    for sample in samples {
        serde_json::to_writer(&mut writer, sample)?;
        writeln!(writer)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let task_names: Vec<String> = args
        .tasks
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if task_names.is_empty() {
        return Err(TaskEvalError::InvalidModelArgs(
            "No tasks specified".to_string(),
        ));
    }

    // Validate tasks and model exist before running
    for task_name in &task_names {
        tasks::get_task(task_name)?;
    }
    models::get_model(&args.model)?;

    let results = evaluate(&args, &task_names).await?;

    let json = serde_json::to_string_pretty(&results)?;
    println!("{}", json);

    Ok(())
}
