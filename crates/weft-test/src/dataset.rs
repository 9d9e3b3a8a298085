//! Run-tracking fixture data.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use weft_core::{Error, Result};

const FIXTURE: &str = include_str!("../fixtures/dataset.json");

/// Entities, their projects and everything logged to them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Entities by name.
    #[serde(default)]
    pub entities: BTreeMap<String, Entity>,
}

/// A user or team owning projects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Projects by name.
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
}

/// A project holding runs and run queues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Runs in creation order.
    #[serde(default)]
    pub runs: Vec<Run>,
    /// Launch queues.
    #[serde(default)]
    pub run_queues: Vec<RunQueue>,
}

/// One logged run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Unique run id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Run state, e.g. `finished` or `crashed`.
    pub state: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Hyperparameters.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Final metrics.
    #[serde(default)]
    pub summary: Map<String, Value>,
    /// Logged rows.
    #[serde(default)]
    pub history: Vec<Value>,
}

/// A launch queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunQueue {
    /// Unique queue id.
    pub id: String,
    /// Queue name.
    pub name: String,
}

impl Dataset {
    /// Parses a dataset from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::serialization()
                .with_message("invalid dataset")
                .with_source(e)
        })
    }

    /// Returns the bundled fixture: entity `shawn` with the projects
    /// `dsviz-demo` (three runs, two run queues) and `empty-project`.
    pub fn fixture() -> Result<Self> {
        Self::from_json(FIXTURE)
    }

    /// Returns a project.
    pub fn project(&self, entity: &str, project: &str) -> Option<&Project> {
        self.entities.get(entity)?.projects.get(project)
    }
}

impl Project {
    /// Returns the run with the given id or name.
    pub fn run(&self, id_or_name: &str) -> Option<&Run> {
        self.runs
            .iter()
            .find(|run| run.id == id_or_name || run.name == id_or_name)
    }

    /// Returns the run queue with the given name.
    pub fn run_queue(&self, name: &str) -> Option<&RunQueue> {
        self.run_queues.iter().find(|queue| queue.name == name)
    }

    /// Returns the runs matching `filter`, sorted by `order`.
    ///
    /// `filter` is an object of field paths (see [`Run::field`]) to expected
    /// values; `null` matches everything. `order` is a field path, prefixed
    /// with `-` for descending or `+` for ascending order; an empty order
    /// keeps creation order.
    pub fn filtered_runs(&self, filter: &Value, order: &str) -> Result<Vec<&Run>> {
        let conditions = match filter {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(Error::invalid_input()
                    .with_message(format!("run filter must be an object, got {other}")));
            }
        };

        let mut runs: Vec<&Run> = self
            .runs
            .iter()
            .filter(|run| {
                conditions
                    .iter()
                    .all(|(path, expected)| run.field(path).as_ref() == Some(expected))
            })
            .collect();

        let (descending, key) = match order.strip_prefix('-') {
            Some(key) => (true, key),
            None => (false, order.trim_start_matches('+')),
        };
        if !key.is_empty() {
            runs.sort_by(|a, b| {
                let ordering = compare(&a.field(key), &b.field(key));
                if descending { ordering.reverse() } else { ordering }
            });
        }
        Ok(runs)
    }
}

impl Run {
    /// Returns a field by path: `id`, `name`, `state`, `createdAt`,
    /// `config.<key>` or `summary.<key>`.
    pub fn field(&self, path: &str) -> Option<Value> {
        match path.split_once('.') {
            Some(("config", key)) => self.config.get(key).cloned(),
            Some(("summary", key)) => self.summary.get(key).cloned(),
            Some(_) => None,
            None => match path {
                "id" => Some(json!(self.id)),
                "name" => Some(json!(self.name)),
                "state" => Some(json!(self.state)),
                "createdAt" => Some(json!(self.created_at.to_string())),
                _ => None,
            },
        }
    }
}

/// Orders missing values first, then numbers, then strings.
fn compare(a: &Option<Value>, b: &Option<Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
