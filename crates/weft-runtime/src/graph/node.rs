//! Immutable graph nodes.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use weft_core::{Digest, DigestBuilder, Type, Value};

use crate::registry::{Args, Operation, OperationKind, Registry};
use crate::{Error, Result};

/// What a node computes.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A literal value.
    Const {
        /// The value.
        value: Value,
    },
    /// The output of an operation applied to named inputs.
    Output {
        /// Resolved operation overload.
        op: Arc<Operation>,
        /// Inputs in signature order.
        inputs: Args<Node>,
    },
}

struct NodeInner {
    kind: NodeKind,
    ty: Type,
    digest: Digest,
}

/// A node of a lazy expression graph.
///
/// Nodes are immutable and cheap to clone. Equality and hashing use the
/// structural [`Digest`], so independently built but identical trees are
/// interchangeable.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    /// Creates a constant node with a declared type.
    pub fn constant(ty: Type, value: Value) -> Self {
        let mut digest = DigestBuilder::new("const");
        digest.ty(&ty).value(&value);
        Self(Arc::new(NodeInner {
            digest: digest.finish(),
            kind: NodeKind::Const { value },
            ty,
        }))
    }

    /// Creates a constant node typed from its value.
    pub fn from_value(value: Value) -> Self {
        Self::constant(Type::from_value(&value), value)
    }

    /// Calls the operation `name` with named inputs.
    ///
    /// Fails with [`Error::Signature`] on unknown, missing or repeated
    /// parameters, and on a type mismatch against the only overload of
    /// `name`; fails with [`Error::NoMatchingOverload`] when `name` is
    /// unknown or none of several overloads accepts the input types.
    pub fn call<K: Into<String>>(
        registry: &Registry,
        name: &str,
        inputs: impl IntoIterator<Item = (K, Node)>,
    ) -> Result<Self> {
        let mut given: Vec<(String, Node)> =
            inputs.into_iter().map(|(k, n)| (k.into(), n)).collect();

        let overloads = registry.overloads(name);
        let Some(first) = overloads.first() else {
            return Err(Error::NoMatchingOverload {
                op: name.to_owned(),
                inputs: given
                    .iter()
                    .map(|(k, n)| format!("{k}: {}", n.output_type()))
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        };

        let mut ordered = Vec::with_capacity(given.len());
        for param in first.signature().param_names() {
            let mut matching = given.iter().filter(|(k, _)| k == param);
            match (matching.next(), matching.next()) {
                (Some((_, node)), None) => ordered.push((param.to_owned(), node.clone())),
                (None, _) => {
                    return Err(Error::signature(name, format!("missing parameter `{param}`")));
                }
                (Some(_), Some(_)) => {
                    return Err(Error::signature(name, format!("parameter `{param}` given twice")));
                }
            }
        }
        given.retain(|(k, _)| !first.signature().param_names().any(|p| p == k));
        if let Some((unknown, _)) = given.first() {
            return Err(Error::signature(name, format!("unknown parameter `{unknown}`")));
        }

        let inputs = Args::new(ordered);
        let types = inputs.map(|n| n.output_type().clone());
        let op = match registry.resolve(name, &types) {
            Ok(op) => op,
            Err(Error::NoMatchingOverload { .. }) if overloads.len() == 1 => {
                return Err(Error::signature(name, mismatch(first, &types)));
            }
            Err(err) => return Err(err),
        };

        Ok(Self::output(op, inputs))
    }

    /// Calls the operation `name` with inputs given by position.
    pub fn apply(registry: &Registry, name: &str, inputs: Vec<Node>) -> Result<Self> {
        let params: Vec<String> = registry
            .get(name)
            .map(|op| op.signature().param_names().map(str::to_owned).collect())
            .unwrap_or_default();
        if !params.is_empty() && params.len() != inputs.len() {
            return Err(Error::signature(
                name,
                format!("expected {} inputs, got {}", params.len(), inputs.len()),
            ));
        }

        let named = params.into_iter().chain((0..).map(|i| format!("arg{i}")));
        Self::call(registry, name, named.zip(inputs))
    }

    /// Builds an output node, deriving its type from the inputs.
    pub(crate) fn output(op: Arc<Operation>, inputs: Args<Node>) -> Self {
        let types = inputs.map(|n| n.output_type().clone());
        let ty = op.output_type(&types, |param| {
            inputs.get(param).and_then(Node::const_value)
        });
        Self::with_type(op, inputs, ty)
    }

    /// Builds an output node with an explicit type.
    pub(crate) fn with_type(op: Arc<Operation>, inputs: Args<Node>, ty: Type) -> Self {
        let mut digest = DigestBuilder::new("output");
        digest.str(op.name()).ty(&ty);
        if let OperationKind::Composite(spec) = op.kind() {
            for step in &spec.steps {
                digest.str(&step.op);
                for arg in &step.args {
                    digest.str(&arg.param).str(&arg.input);
                }
            }
        }
        for (param, input) in inputs.iter() {
            digest.str(param).digest(&input.digest());
        }
        Self(Arc::new(NodeInner {
            digest: digest.finish(),
            kind: NodeKind::Output { op, inputs },
            ty,
        }))
    }

    /// Rebuilds this output node over new inputs, re-deriving its type.
    ///
    /// Returns `self` when nothing changed. Constants are returned as is.
    pub(crate) fn with_inputs(&self, inputs: Args<Node>) -> Self {
        match &self.0.kind {
            NodeKind::Output { op, inputs: old } if *old != inputs => {
                Self::output(op.clone(), inputs)
            }
            _ => self.clone(),
        }
    }

    /// Returns the structural digest.
    pub fn digest(&self) -> Digest {
        self.0.digest
    }

    /// Returns the declared output type.
    pub fn output_type(&self) -> &Type {
        &self.0.ty
    }

    /// Returns what this node computes.
    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// Returns the operation name, or `const`.
    pub fn name(&self) -> &str {
        match &self.0.kind {
            NodeKind::Const { .. } => "const",
            NodeKind::Output { op, .. } => op.name(),
        }
    }

    /// Returns the operation of an output node.
    pub fn op(&self) -> Option<&Arc<Operation>> {
        match &self.0.kind {
            NodeKind::Output { op, .. } => Some(op),
            NodeKind::Const { .. } => None,
        }
    }

    /// Returns the inputs of an output node.
    pub fn inputs(&self) -> Option<&Args<Node>> {
        match &self.0.kind {
            NodeKind::Output { inputs, .. } => Some(inputs),
            NodeKind::Const { .. } => None,
        }
    }

    /// Returns the input named `param`.
    pub fn input(&self, param: &str) -> Option<&Node> {
        self.inputs().and_then(|inputs| inputs.get(param))
    }

    /// Returns the value of a constant node.
    pub fn const_value(&self) -> Option<&Value> {
        match &self.0.kind {
            NodeKind::Const { value } => Some(value),
            NodeKind::Output { .. } => None,
        }
    }

    /// Returns `true` for constant nodes.
    pub fn is_const(&self) -> bool {
        matches!(self.0.kind, NodeKind::Const { .. })
    }

    /// Returns every reachable node once, inputs before their consumers.
    pub fn walk(&self) -> Vec<Node> {
        walk([self])
    }
}

/// Returns every node reachable from `roots` once, inputs first.
pub fn walk<'a>(roots: impl IntoIterator<Item = &'a Node>) -> Vec<Node> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    // Explicit stack; deep chains must not overflow.
    let roots: Vec<&Node> = roots.into_iter().collect();
    let mut stack: Vec<(Node, bool)> = roots.into_iter().rev().map(|n| (n.clone(), false)).collect();
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            if seen.insert(node.digest()) {
                order.push(node);
            }
            continue;
        }
        if seen.contains(&node.digest()) {
            continue;
        }
        let inputs: Vec<Node> = node.inputs().map(|i| i.values().cloned().collect()).unwrap_or_default();
        stack.push((node, true));
        for input in inputs.into_iter().rev() {
            if !seen.contains(&input.digest()) {
                stack.push((input, false));
            }
        }
    }
    order
}

fn mismatch(op: &Operation, given: &Args<Type>) -> String {
    let expected = op
        .signature()
        .params()
        .iter()
        .map(|p| format!("{}: {}", p.name, p.ty))
        .collect::<Vec<_>>()
        .join(", ");
    format!("expected ({expected}), got ({})", given.describe())
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        // Unlinks uniquely owned inputs one at a time; deep chains must not
        // overflow on drop either.
        let mut stack = Vec::new();
        if let NodeKind::Output { inputs, .. } = &mut self.kind {
            stack.extend(inputs.drain_values());
        }
        while let Some(node) = stack.pop() {
            if let Some(mut inner) = Arc::into_inner(node.0)
                && let NodeKind::Output { inputs, .. } = &mut inner.kind
            {
                stack.extend(inputs.drain_values());
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.0.digest == other.0.digest
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.digest.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Const { value } => write!(f, "const({value}): {}", self.0.ty),
            NodeKind::Output { op, inputs } => {
                write!(f, "{}(", op.name())?;
                for (i, (param, input)) in inputs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}={input:?}")?;
                }
                write!(f, "): {}", self.0.ty)
            }
        }
    }
}
