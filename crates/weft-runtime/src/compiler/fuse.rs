//! Pushdown fusion.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use weft_core::{BoxedError, Digest};

use crate::graph::{Node, NodeKind, walk};
use crate::registry::{Args, ChainStep, FusionPattern, Operation, Param, Signature};

/// Input name of the chain anchor on composite nodes.
pub const ANCHOR_INPUT: &str = "input";

/// One bottom-up fusion pass.
pub(super) struct Fuser<'a> {
    rewritten: HashMap<Digest, Node>,
    failed: &'a mut HashSet<Digest>,
    pub fusions: usize,
    pub fallbacks: usize,
}

impl<'a> Fuser<'a> {
    /// Creates a pass. Nodes in `failed` already fell back in an earlier
    /// pass and are not retried.
    pub fn new(failed: &'a mut HashSet<Digest>) -> Self {
        Self {
            rewritten: HashMap::new(),
            failed,
            fusions: 0,
            fallbacks: 0,
        }
    }

    /// Rewrites the tree rooted at `root`, inputs before their consumers.
    pub fn fuse(&mut self, root: &Node) -> Node {
        for node in walk([root]) {
            if self.rewritten.contains_key(&node.digest()) {
                continue;
            }
            let rewritten = match node.kind() {
                NodeKind::Const { .. } => node.clone(),
                NodeKind::Output { inputs, .. } => {
                    let inputs = inputs.map(|input| self.rewritten(input));
                    let node = node.with_inputs(inputs);
                    self.try_fuse(&node).unwrap_or(node)
                }
            };
            self.rewritten.insert(node.digest(), rewritten);
        }
        self.rewritten(root)
    }

    fn rewritten(&self, node: &Node) -> Node {
        self.rewritten.get(&node.digest()).unwrap_or(node).clone()
    }

    fn try_fuse(&mut self, node: &Node) -> Option<Node> {
        let pushdown = node.op()?.pushdown()?;
        if self.failed.contains(&node.digest()) {
            return None;
        }

        let chain = chain(node);
        let pattern = pushdown
            .patterns()
            .into_iter()
            .find(|pattern| pattern.matches(&chain))?;
        let matched = &chain[chain.len() - pattern.steps.len()..];
        if !matched.first()?.op().is_remote_step() {
            return None;
        }

        match synthesize(pattern, matched, node) {
            Ok(composite) => {
                tracing::trace!(
                    target: crate::TRACING_TARGET_COMPILER,
                    composite = %composite.name(),
                    steps = matched.len(),
                    digest = %composite.digest().short(),
                    "fused chain"
                );
                self.fusions += 1;
                Some(composite)
            }
            Err(error) => {
                tracing::warn!(
                    target: crate::TRACING_TARGET_COMPILER,
                    pattern = %pattern.name(),
                    digest = %node.digest().short(),
                    %error,
                    "pushdown builder failed, leaving chain unfused"
                );
                self.failed.insert(node.digest());
                self.fallbacks += 1;
                None
            }
        }
    }
}

/// Collects the pushdown chain ending at `node`.
///
/// Walks first inputs through chainable operations and stops after a root
/// step. The chain starts at its first remote step.
fn chain(node: &Node) -> Vec<ChainStep> {
    let mut steps = Vec::new();
    let mut current = Some(node.clone());
    while let Some(node) = current.take() {
        let Some(op) = node.op().filter(|op| op.is_chainable()).cloned() else {
            break;
        };
        let root = op.is_root_step();
        current = if root {
            None
        } else {
            node.inputs().and_then(Args::first).cloned()
        };
        steps.push(ChainStep::new(node, op, !root));
    }
    steps.reverse();

    match steps.iter().position(|step| step.op().is_remote_step()) {
        Some(start) => steps.split_off(start),
        None => Vec::new(),
    }
}

/// Builds the composite node replacing `terminal`.
fn synthesize(
    pattern: &FusionPattern,
    matched: &[ChainStep],
    terminal: &Node,
) -> Result<Node, BoxedError> {
    let spec = pattern.build(matched)?;
    if spec.steps.is_empty() {
        return Err("composite has no steps".into());
    }

    let mut available = HashMap::new();
    for (index, step) in matched.iter().enumerate() {
        for (param, node) in step.args() {
            available.insert(crate::registry::arg_input_name(index, param), node);
        }
    }

    let mut inputs: Vec<(String, Node)> = Vec::new();
    if let Some(first) = matched.first().filter(|step| step.is_chained())
        && let Some(anchor) = first.node().inputs().and_then(Args::first)
    {
        inputs.push((ANCHOR_INPUT.to_owned(), anchor.clone()));
    }
    for arg in spec.steps.iter().flat_map(|step| &step.args) {
        let node = available
            .get(&arg.input)
            .ok_or_else(|| format!("composite input `{}` is not an argument of the chain", arg.input))?;
        if !inputs.iter().any(|(name, _)| *name == arg.input) {
            inputs.push((arg.input.clone(), (*node).clone()));
        }
    }

    let ty = terminal.output_type().clone();
    let signature = Signature::new(
        inputs
            .iter()
            .map(|(name, node)| Param::new(name.as_str(), node.output_type().clone())),
    )
    .returns(ty.clone());
    let op = Arc::new(Operation::composite(spec, signature));
    Ok(Node::with_type(op, Args::new(inputs), ty))
}
