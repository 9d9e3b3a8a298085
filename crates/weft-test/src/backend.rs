//! In-memory remote backend.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use weft_core::{Error, Resolved, Result};
use weft_runtime::remote::{CallStep, CompositeCall, RemoteExecutor};

use crate::dataset::{Dataset, Project, Run};

/// Tracing target for backend calls.
const TRACING_TARGET: &str = "weft_test::backend";

/// Configuration for the in-memory backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryBackendConfig {
    /// Artificial delay added to every call.
    #[serde(default)]
    pub latency: SignedDuration,
}

/// Remote executor answering calls from a [`Dataset`].
///
/// Understands the run-tracking steps (`root-project`, `project-runs`,
/// `run-history`, ...) and the collection steps that fuse into them
/// (`count`, `limit`). Every call is recorded, so tests can assert how many
/// round trips an evaluation took and what was fused.
///
/// Domain objects travel as references: a project is
/// `{"entityName", "projectName"}`, runs and run queues additionally carry
/// `id` and `name`.
#[derive(Debug)]
pub struct MemoryBackend {
    dataset: Dataset,
    config: MemoryBackendConfig,
    calls: Mutex<Vec<CompositeCall>>,
}

impl MemoryBackend {
    /// Creates a backend over `dataset`.
    pub fn new(dataset: Dataset) -> Self {
        Self::with_config(dataset, MemoryBackendConfig::default())
    }

    /// Creates a backend with the given configuration.
    pub fn with_config(dataset: Dataset, config: MemoryBackendConfig) -> Self {
        Self {
            dataset,
            config,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn recorded(&self) -> MutexGuard<'_, Vec<CompositeCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<CompositeCall> {
        self.recorded().clone()
    }

    /// Returns the number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.recorded().len()
    }

    /// Returns the number of calls that executed the step `op`.
    pub fn step_count(&self, op: &str) -> usize {
        self.recorded()
            .iter()
            .flat_map(|call| call.step_names())
            .filter(|name| *name == op)
            .count()
    }

    /// Forgets recorded calls.
    pub fn reset(&self) {
        self.recorded().clear();
    }

    fn run(&self, call: &CompositeCall) -> Result<Value> {
        let mut current = call.input.clone().unwrap_or(Value::Null);
        for step in &call.steps {
            current = self.step(step, current)?;
        }
        Ok(current)
    }

    fn step(&self, step: &CallStep, current: Value) -> Result<Value> {
        match step.op.as_str() {
            "root-project" => {
                let entity = str_arg(step, "entityName")?;
                let project = str_arg(step, "projectName")?;
                self.dataset
                    .project(entity, project)
                    .ok_or_else(|| not_found(format!("project {entity}/{project}")))?;
                Ok(json!({"entityName": entity, "projectName": project}))
            }
            "project-name" => Ok(current["projectName"].clone()),
            "project-runs" => {
                let project = self.project(&current)?;
                Ok(run_refs(&current, project.runs.iter()))
            }
            "project-run" => {
                let project = self.project(&current)?;
                let name = str_arg(step, "runName")?;
                let run = project
                    .run(name)
                    .ok_or_else(|| not_found(format!("run {name}")))?;
                Ok(run_ref(&current, run))
            }
            "project-filteredRuns" => {
                let project = self.project(&current)?;
                let filter = step.arg("filter").cloned().unwrap_or(Value::Null);
                let order = step.arg("order").and_then(Value::as_str).unwrap_or_default();
                let runs = project.filtered_runs(&filter, order)?;
                Ok(run_refs(&current, runs.into_iter()))
            }
            "project-runQueue" => {
                let project = self.project(&current)?;
                let name = str_arg(step, "queueName")?;
                let queue = project
                    .run_queue(name)
                    .ok_or_else(|| not_found(format!("run queue {name}")))?;
                Ok(json!({
                    "entityName": current["entityName"],
                    "projectName": current["projectName"],
                    "id": queue.id,
                    "name": queue.name,
                }))
            }
            "runQueue-id" => Ok(current["id"].clone()),
            "run-id" | "run-name" | "run-summary" | "run-history" | "run-historyLineCount" => {
                match current {
                    Value::Array(runs) => runs
                        .iter()
                        .map(|run| self.run_attribute(&step.op, run))
                        .collect::<Result<Vec<_>>>()
                        .map(Value::Array),
                    run => self.run_attribute(&step.op, &run),
                }
            }
            "count" => match &current {
                Value::Array(items) => Ok(json!(items.len())),
                Value::Object(map) => Ok(json!(map.len())),
                other => Err(invalid(format!("cannot count {other}"))),
            },
            "limit" => {
                let limit = step
                    .arg("limit")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| invalid("`limit` must be a non-negative integer"))?;
                match current {
                    Value::Array(mut items) => {
                        items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                        Ok(Value::Array(items))
                    }
                    other => Err(invalid(format!("cannot limit {other}"))),
                }
            }
            other => Err(Error::unsupported().with_message(format!("unknown step `{other}`"))),
        }
    }

    fn run_attribute(&self, op: &str, reference: &Value) -> Result<Value> {
        match op {
            "run-id" => Ok(reference["id"].clone()),
            "run-name" => Ok(reference["name"].clone()),
            "run-summary" => Ok(Value::Object(self.run_of(reference)?.summary.clone())),
            "run-history" => Ok(Value::Array(self.run_of(reference)?.history.clone())),
            _ => Ok(json!(self.run_of(reference)?.history.len())),
        }
    }

    fn project(&self, reference: &Value) -> Result<&Project> {
        let entity = reference["entityName"].as_str().unwrap_or_default();
        let project = reference["projectName"].as_str().unwrap_or_default();
        self.dataset
            .project(entity, project)
            .ok_or_else(|| not_found(format!("project {entity}/{project}")))
    }

    fn run_of(&self, reference: &Value) -> Result<&Run> {
        let id = reference["id"].as_str().unwrap_or_default();
        self.project(reference)?
            .run(id)
            .ok_or_else(|| not_found(format!("run {id}")))
    }
}

#[async_trait]
impl RemoteExecutor for MemoryBackend {
    async fn execute(&self, call: CompositeCall) -> Result<Resolved> {
        tracing::debug!(
            target: TRACING_TARGET,
            call = %call.name,
            steps = call.steps.len(),
            "executing call"
        );
        self.recorded().push(call.clone());

        if self.config.latency.is_positive() {
            tokio::time::sleep(self.config.latency.unsigned_abs()).await;
        }
        self.run(&call).map(Resolved::infer)
    }
}

fn str_arg<'a>(step: &'a CallStep, param: &str) -> Result<&'a str> {
    step.arg(param)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("`{}` needs a string `{param}`", step.op)))
}

fn run_ref(project: &Value, run: &Run) -> Value {
    json!({
        "entityName": project["entityName"],
        "projectName": project["projectName"],
        "id": run.id,
        "name": run.name,
    })
}

fn run_refs<'a>(project: &Value, runs: impl Iterator<Item = &'a Run>) -> Value {
    Value::Array(runs.map(|run| run_ref(project, run)).collect())
}

fn not_found(what: String) -> Error {
    Error::not_found().with_message(format!("{what} does not exist"))
}

fn invalid(message: impl Into<String>) -> Error {
    Error::invalid_input().with_message(message)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn backend() -> MemoryBackend {
        MemoryBackend::new(Dataset::fixture().unwrap())
    }

    fn step(op: &str, args: Value) -> CallStep {
        let args: BTreeMap<String, Value> = serde_json::from_value(args).unwrap();
        CallStep::new(op, args)
    }

    fn project_step() -> CallStep {
        step(
            "root-project",
            json!({"entityName": "shawn", "projectName": "dsviz-demo"}),
        )
    }

    #[tokio::test]
    async fn test_fused_filtered_count() {
        let backend = backend();
        let call = CompositeCall {
            name: "project-filteredCount".into(),
            input: None,
            steps: vec![
                project_step(),
                step("project-filteredRuns", json!({"filter": {"state": "finished"}, "order": "-createdAt"})),
                step("count", json!({})),
            ],
        };

        let resolved = backend.execute(call).await.unwrap();
        assert_eq!(resolved.value(), &json!(2));
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.step_count("project-filteredRuns"), 1);
    }

    #[tokio::test]
    async fn test_chained_input() {
        let backend = backend();
        let run = json!({
            "entityName": "shawn",
            "projectName": "dsviz-demo",
            "id": "2ed5xwpn",
            "name": "fresh-sun-1",
        });
        let call = CompositeCall {
            name: "run-history".into(),
            input: Some(run),
            steps: vec![step("run-history", json!({}))],
        };

        let resolved = backend.execute(call).await.unwrap();
        assert_eq!(resolved.value().as_array().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn test_run_steps_map_over_lists() {
        let backend = backend();
        let call = CompositeCall {
            name: "project-runs".into(),
            input: None,
            steps: vec![project_step(), step("project-runs", json!({})), step("run-name", json!({}))],
        };

        let resolved = backend.execute(call).await.unwrap();
        assert_eq!(
            resolved.value(),
            &json!(["fresh-sun-1", "misty-grass-2", "stellar-wave-3"])
        );
    }

    #[tokio::test]
    async fn test_missing_project() {
        let backend = backend();
        let call = CompositeCall {
            name: "root-project".into(),
            input: None,
            steps: vec![step(
                "root-project",
                json!({"entityName": "shawn", "projectName": "nope"}),
            )],
        };

        let err = backend.execute(call).await.unwrap_err();
        assert_eq!(err.kind(), weft_core::ErrorKind::NotFound);
        assert_eq!(backend.call_count(), 1);

        backend.reset();
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_step() {
        let call = CompositeCall {
            name: "project-delete".into(),
            input: None,
            steps: vec![step("project-delete", json!({}))],
        };

        let err = backend().execute(call).await.unwrap_err();
        assert_eq!(err.kind(), weft_core::ErrorKind::Unsupported);
    }
}
