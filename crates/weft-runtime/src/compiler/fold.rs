//! Compile-time folding of value-dependent inputs.

use std::collections::HashMap;

use weft_core::{Digest, Resolved, Value};

use crate::graph::{Node, NodeKind, walk};
use crate::registry::{Args, OperationKind};

/// Replaces the value input of value-dependent operations by a constant
/// when it can be computed from constants and local operations alone.
#[derive(Default)]
pub(super) struct Folder {
    rewritten: HashMap<Digest, Node>,
    values: HashMap<Digest, Option<Value>>,
    pub folded: usize,
}

impl Folder {
    pub fn fold(&mut self, root: &Node) -> Node {
        for node in walk([root]) {
            if self.rewritten.contains_key(&node.digest()) {
                continue;
            }
            let NodeKind::Output { op, inputs } = node.kind() else {
                continue;
            };
            let inputs = inputs.map(|input| self.rewritten(input));
            let inputs = match op.signature().value_param() {
                Some(param) => self.fold_param(param, inputs),
                None => inputs,
            };
            self.rewritten.insert(node.digest(), node.with_inputs(inputs));
        }
        self.rewritten(root)
    }

    fn rewritten(&self, node: &Node) -> Node {
        self.rewritten.get(&node.digest()).unwrap_or(node).clone()
    }

    fn fold_param(&mut self, param: &str, inputs: Args<Node>) -> Args<Node> {
        let Some(input) = inputs.get(param).filter(|n| !n.is_const()) else {
            return inputs;
        };
        let Some(value) = self.evaluate(input) else {
            return inputs;
        };

        tracing::trace!(
            target: crate::TRACING_TARGET_COMPILER,
            param,
            digest = %input.digest().short(),
            "folded value-dependent input"
        );
        self.folded += 1;
        let constant = Node::constant(input.output_type().clone(), value);
        inputs
            .iter()
            .map(|(name, node)| {
                let node = if name == param { constant.clone() } else { node.clone() };
                (name.to_owned(), node)
            })
            .collect()
    }

    /// Evaluates a subtree of constants and local operations.
    ///
    /// Returns `None` when the subtree reaches a remote operation or an
    /// implementation fails; the failure then surfaces at evaluation time.
    fn evaluate(&mut self, root: &Node) -> Option<Value> {
        for node in walk([root]) {
            if self.values.contains_key(&node.digest()) {
                continue;
            }
            let value = match node.kind() {
                NodeKind::Const { value } => Some(value.clone()),
                NodeKind::Output { op, inputs } => match op.kind() {
                    OperationKind::Local(implementation) => inputs
                        .iter()
                        .map(|(param, input)| {
                            let value = self.values.get(&input.digest()).cloned().flatten()?;
                            Some((param.to_owned(), Resolved::new(value, input.output_type().clone())))
                        })
                        .collect::<Option<Vec<_>>>()
                        .and_then(|args| implementation(&Args::new(args)).ok()),
                    _ => None,
                },
            };
            self.values.insert(node.digest(), value);
        }
        self.values.get(&root.digest()).cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use weft_core::Type;

    use super::*;
    use crate::testing;

    #[test]
    fn test_folds_local_key() {
        let registry = testing::registry();
        let row = Node::from_value(json!({"loss": 0.5, "step": 3}));
        let key = Node::call(
            &registry,
            "string-add",
            [("lhs", Node::from_value(json!("st"))), ("rhs", Node::from_value(json!("ep")))],
        )
        .unwrap();
        let pick = Node::call(&registry, "pick", [("obj", row), ("key", key)]).unwrap();
        assert_eq!(pick.output_type(), &Type::Any);

        let mut folder = Folder::default();
        let folded = folder.fold(&pick);

        assert_eq!(folder.folded, 1);
        assert_eq!(folded.output_type(), &Type::Int);
        assert!(folded.input("key").is_some_and(Node::is_const));
    }

    #[test]
    fn test_leaves_remote_key() {
        let registry = testing::registry();
        let store = Node::call(&registry, "root-store", [("name", Node::from_value(json!("a")))]).unwrap();
        let name = Node::call(&registry, "store-name", [("store", store)]).unwrap();
        let pick = Node::call(
            &registry,
            "pick",
            [("obj", Node::from_value(json!({"a": 1}))), ("key", name)],
        )
        .unwrap();

        let mut folder = Folder::default();
        let folded = folder.fold(&pick);

        assert_eq!(folder.folded, 0);
        assert_eq!(folded, pick);
    }
}
