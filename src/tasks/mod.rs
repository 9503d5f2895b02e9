//! Task registry and implementations

pub mod german_ler;
pub mod xstance;

use crate::error::{Result, TaskEvalError};
use crate::task::Task;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Task factory function type
type TaskFactory = fn() -> Box<dyn Task>;

/// Registry of available tasks
static TASK_REGISTRY: Lazy<HashMap<&'static str, TaskFactory>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, TaskFactory> = HashMap::new();
    m.insert("xstance", xstance::xstance);
    m.insert("german_ler", german_ler::german_ler);
    m
});

/// Get a task by name
pub fn get_task(name: &str) -> Result<Box<dyn Task>> {
    TASK_REGISTRY
        .get(name)
        .map(|factory| factory())
        .ok_or_else(|| {
            let available: Vec<&str> = TASK_REGISTRY.keys().copied().collect();
            TaskEvalError::UnknownTask(name.to_string(), available.join(", "))
        })
}

/// Get all available task names
pub fn available_tasks() -> Vec<&'static str> {
    TASK_REGISTRY.keys().copied().collect()
}
