//! Pushdown metadata and fusion patterns.
//!
//! A [`FusionPattern`] names a chain of operations (terminal last) that the
//! remote service can evaluate as one call. Patterns are attached to the
//! terminal operation through its [`PushdownSpec`]. When the compiler finds
//! a matching chain it hands the matched [`ChainStep`]s to the pattern's
//! [`CompositeBuilder`], which describes the composite call as a
//! [`CompositeSpec`].

use std::fmt;
use std::sync::Arc;

use weft_core::{BoxedError, Type};

use super::Operation;
use crate::graph::Node;

/// Emits the composite descriptor for a matched chain.
///
/// Returning an error leaves the chain unfused.
pub type CompositeBuilder =
    Arc<dyn Fn(&FusionPattern, &[ChainStep]) -> Result<CompositeSpec, BoxedError> + Send + Sync>;

/// Pushdown metadata of a terminal operation.
#[derive(Debug, Clone, Default)]
pub struct PushdownSpec {
    patterns: Vec<FusionPattern>,
}

impl PushdownSpec {
    /// Creates empty pushdown metadata.
    ///
    /// An operation with empty metadata may still appear inside chains that
    /// other operations terminate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pattern this operation terminates.
    pub fn with_pattern(mut self, pattern: FusionPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Returns the patterns, longest first, in declaration order otherwise.
    pub fn patterns(&self) -> Vec<&FusionPattern> {
        let mut patterns: Vec<_> = self.patterns.iter().collect();
        patterns.sort_by_key(|p| std::cmp::Reverse(p.steps.len()));
        patterns
    }
}

/// A chain of operation names fusable into one remote call.
#[derive(Clone)]
pub struct FusionPattern {
    /// Domain half of the composite name, e.g. `project`.
    pub domain: String,
    /// Verb half of the composite name, e.g. `filteredCount`.
    pub verb: String,
    /// Operation names of the chain, terminal last.
    pub steps: Vec<String>,
    /// Required first-parameter types of the resolved overloads of steps.
    pub overloads: Vec<(String, Type)>,
    builder: CompositeBuilder,
}

impl FusionPattern {
    /// Creates a pattern using [`default_builder`].
    pub fn new<S: Into<String>>(
        domain: impl Into<String>,
        verb: impl Into<String>,
        steps: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            domain: domain.into(),
            verb: verb.into(),
            steps: steps.into_iter().map(Into::into).collect(),
            overloads: Vec::new(),
            builder: Arc::new(default_builder),
        }
    }

    /// Only matches when step `op` resolved to the overload whose first
    /// parameter is declared as `ty`.
    pub fn with_overload(mut self, op: impl Into<String>, ty: Type) -> Self {
        self.overloads.push((op.into(), ty));
        self
    }

    /// Replaces the builder.
    pub fn with_builder(
        mut self,
        builder: impl Fn(&FusionPattern, &[ChainStep]) -> Result<CompositeSpec, BoxedError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.builder = Arc::new(builder);
        self
    }

    /// Returns the composite operation name, `{domain}-{verb}`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.domain, self.verb)
    }

    /// Returns `true` if `chain` ends with exactly this pattern's steps,
    /// resolved to the required overloads.
    pub fn matches(&self, chain: &[ChainStep]) -> bool {
        chain.len() >= self.steps.len()
            && chain[chain.len() - self.steps.len()..]
                .iter()
                .zip(&self.steps)
                .all(|(step, name)| step.op().name() == name && self.accepts(step.op()))
    }

    fn accepts(&self, op: &Operation) -> bool {
        self.overloads
            .iter()
            .filter(|(name, _)| name == op.name())
            .all(|(_, ty)| op.signature().params().first().is_some_and(|p| &p.ty == ty))
    }

    /// Runs the builder over the matched steps.
    pub fn build(&self, steps: &[ChainStep]) -> Result<CompositeSpec, BoxedError> {
        (self.builder)(self, steps)
    }
}

impl fmt::Debug for FusionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FusionPattern")
            .field("name", &self.name())
            .field("steps", &self.steps)
            .field("overloads", &self.overloads)
            .finish_non_exhaustive()
    }
}

/// One node of a matched chain.
#[derive(Debug, Clone)]
pub struct ChainStep {
    node: Node,
    op: Arc<Operation>,
    chained: bool,
}

impl ChainStep {
    /// Creates a step. `chained` steps receive their first input from the
    /// previous step of the chain rather than as an argument.
    pub(crate) fn new(node: Node, op: Arc<Operation>, chained: bool) -> Self {
        Self { node, op, chained }
    }

    /// Returns the node of this step.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Returns the operation of this step.
    pub fn op(&self) -> &Operation {
        &self.op
    }

    /// Returns `true` if the first input comes from the previous step.
    pub fn is_chained(&self) -> bool {
        self.chained
    }

    /// Iterates the inputs passed as arguments of the remote step.
    pub fn args(&self) -> impl Iterator<Item = (&str, &Node)> {
        let skip = usize::from(self.chained);
        self.node.inputs().into_iter().flat_map(|inputs| inputs.iter()).skip(skip)
    }
}

/// One argument of a composite step, bound to a composite input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepArg {
    /// Parameter name of the step.
    pub param: String,
    /// Input name of the composite node supplying the value.
    pub input: String,
}

/// One step of a composite call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTemplate {
    /// Remote operation name.
    pub op: String,
    /// Arguments of the step.
    pub args: Vec<StepArg>,
}

/// Descriptor of a synthesized composite operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeSpec {
    /// Composite operation name.
    pub name: String,
    /// Steps in call order.
    pub steps: Vec<StepTemplate>,
}

/// Returns the composite input name of argument `param` of step `index`.
pub fn arg_input_name(index: usize, param: &str) -> String {
    format!("{index}.{param}")
}

/// Builds a composite whose steps mirror the chain.
///
/// Every argument must be a constant; the remote service receives arguments
/// inline and cannot wait on local results.
pub fn default_builder(
    pattern: &FusionPattern,
    steps: &[ChainStep],
) -> Result<CompositeSpec, BoxedError> {
    let steps = steps
        .iter()
        .enumerate()
        .map(|(index, step)| -> Result<StepTemplate, String> {
            let args = step
                .args()
                .map(|(param, node)| {
                    if !node.is_const() {
                        return Err(format!(
                            "argument `{param}` of `{}` is not a constant",
                            step.op().name()
                        ));
                    }
                    Ok(StepArg {
                        param: param.to_owned(),
                        input: arg_input_name(index, param),
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;
            Ok(StepTemplate {
                op: step.op().name().to_owned(),
                args,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(CompositeSpec {
        name: pattern.name(),
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_longest_first() {
        let spec = PushdownSpec::new()
            .with_pattern(FusionPattern::new("project", "runCount", ["project-runs", "count"]))
            .with_pattern(FusionPattern::new(
                "project",
                "filteredCount",
                ["root-project", "project-filteredRuns", "count"],
            ))
            .with_pattern(FusionPattern::new("project", "other", ["project-other", "count"]));

        let names: Vec<_> = spec.patterns().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            ["project-filteredCount", "project-runCount", "project-other"]
        );
    }

    #[test]
    fn test_overload_guard() {
        use serde_json::json;

        use crate::registry::{Operation, Param, Signature};

        let store = Type::object("store");
        let single = Operation::remote(
            "store-items",
            Signature::new([Param::new("store", store.clone())]).returns(Type::list(Type::Int)),
        );
        let listed = Operation::remote(
            "store-items",
            Signature::new([Param::new("store", Type::list(store.clone()))])
                .returns(Type::list(Type::list(Type::Int))),
        );
        let pattern = FusionPattern::new("store", "itemCount", ["store-items"])
            .with_overload("store-items", store);

        let step = |op: Operation| {
            let node = Node::from_value(json!(null));
            ChainStep::new(node, Arc::new(op), true)
        };
        assert!(pattern.matches(&[step(single)]));
        assert!(!pattern.matches(&[step(listed)]));
    }

    #[test]
    fn test_arg_input_name() {
        assert_eq!(arg_input_name(1, "filter"), "1.filter");
    }
}
