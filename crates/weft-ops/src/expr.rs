//! Fluent expression builder.

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use weft_core::Type;
use weft_runtime::graph::Node;
use weft_runtime::registry::Registry;
use weft_runtime::{Error, Result};

use crate::types::object_kind;

/// A graph node bound to the registry it was built from.
///
/// Every method builds a new node on top of this one; nothing is evaluated.
/// Accessors such as [`Expr::name`] dispatch on the object kind of the
/// current type, so `project.name()` calls `project-name` while
/// `run.name()` and `runs.name()` call the `run-name` overloads.
#[derive(Clone)]
pub struct Expr {
    node: Node,
    registry: Arc<Registry>,
}

impl Expr {
    /// Wraps an existing node.
    pub fn new(registry: Arc<Registry>, node: Node) -> Self {
        Self { node, registry }
    }

    /// A constant.
    pub fn value(registry: &Arc<Registry>, value: impl Into<Value>) -> Self {
        Self::new(registry.clone(), Node::from_value(value.into()))
    }

    /// The project `project` of entity `entity`.
    pub fn project(registry: &Arc<Registry>, entity: &str, project: &str) -> Result<Self> {
        let node = Node::call(
            registry,
            "root-project",
            [
                ("entityName", Node::from_value(json!(entity))),
                ("projectName", Node::from_value(json!(project))),
            ],
        )?;
        Ok(Self::new(registry.clone(), node))
    }

    /// Returns the node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Returns the node, consuming the expression.
    pub fn into_node(self) -> Node {
        self.node
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the declared type.
    pub fn output_type(&self) -> &Type {
        self.node.output_type()
    }

    /// Calls `name` with this expression as the first input, followed by
    /// `args`.
    pub fn apply(&self, name: &str, args: impl IntoIterator<Item = Node>) -> Result<Self> {
        let mut inputs = vec![self.node.clone()];
        inputs.extend(args);
        let node = Node::apply(&self.registry, name, inputs)?;
        Ok(Self::new(self.registry.clone(), node))
    }

    /// Calls the accessor `attr` of the current object kind.
    fn member(&self, attr: &str, args: impl IntoIterator<Item = Node>) -> Result<Self> {
        let Some(kind) = object_kind(self.output_type()) else {
            return Err(Error::signature(
                attr,
                format!("`{}` has no attribute `{attr}`", self.output_type()),
            ));
        };
        self.apply(&format!("{kind}-{attr}"), args)
    }

    /// Name of a project, run or list of runs.
    pub fn name(&self) -> Result<Self> {
        self.member("name", [])
    }

    /// Id of a run, run queue or list of runs.
    pub fn id(&self) -> Result<Self> {
        self.member("id", [])
    }

    /// Every run of a project.
    pub fn runs(&self) -> Result<Self> {
        self.member("runs", [])
    }

    /// The run of a project with the given id or name.
    pub fn run(&self, name: &str) -> Result<Self> {
        self.member("run", [Node::from_value(json!(name))])
    }

    /// Runs of a project matching `filter`, sorted by `order`.
    ///
    /// `filter` maps field paths (`state`, `config.optimizer`, ...) to
    /// values, `null` matches every run; `order` is a field path prefixed
    /// with `-` (descending) or `+` (ascending).
    pub fn filtered_runs(&self, filter: Value, order: &str) -> Result<Self> {
        self.member(
            "filteredRuns",
            [Node::from_value(filter), Node::from_value(json!(order))],
        )
    }

    /// The launch queue of a project with the given name.
    pub fn run_queue(&self, name: &str) -> Result<Self> {
        self.member("runQueue", [Node::from_value(json!(name))])
    }

    /// Final metrics of a run.
    pub fn summary(&self) -> Result<Self> {
        self.member("summary", [])
    }

    /// Logged rows of a run.
    pub fn history(&self) -> Result<Self> {
        self.member("history", [])
    }

    /// Number of logged rows of a run.
    pub fn history_line_count(&self) -> Result<Self> {
        self.member("historyLineCount", [])
    }

    /// Number of elements of a list or entries of a dict.
    pub fn count(&self) -> Result<Self> {
        self.apply("count", [])
    }

    /// The first `limit` elements of a list.
    pub fn limit(&self, limit: u64) -> Result<Self> {
        self.apply("limit", [Node::from_value(json!(limit))])
    }

    /// The element at `index`; negative indices count from the end.
    pub fn index(&self, index: i64) -> Result<Self> {
        self.apply("index", [Node::from_value(json!(index))])
    }

    /// The entry `key` of a dict, or of every dict of a list.
    pub fn pick(&self, key: &str) -> Result<Self> {
        self.apply("pick", [Node::from_value(json!(key))])
    }

    /// Like [`Expr::pick`] with a computed key.
    pub fn pick_by(&self, key: &Expr) -> Result<Self> {
        self.apply("pick", [key.node.clone()])
    }

    /// Flattens a list of lists.
    pub fn concat(&self) -> Result<Self> {
        self.apply("concat", [])
    }

    /// `true` if the value is `null`.
    pub fn is_none(&self) -> Result<Self> {
        self.apply("isNone", [])
    }

    /// Adds two numbers or concatenates two strings.
    pub fn add(&self, other: &Expr) -> Result<Self> {
        let name = match self.output_type().untagged() {
            Type::String => "string-add",
            _ => "number-add",
        };
        self.apply(name, [other.node.clone()])
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expr").field(&self.node).finish()
    }
}

impl From<Expr> for Node {
    fn from(expr: Expr) -> Self {
        expr.node
    }
}
