//! JSON form of node trees.
//!
//! ```json
//! {"nodeType": "output", "type": {...}, "fromOp": {"name": "count", "inputs": {"arr": {...}}}}
//! {"nodeType": "const", "type": {...}, "val": 3}
//! ```
//!
//! Both directions are iterative.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Map;
use weft_core::{Digest, Type, Value};

use super::{Node, NodeKind};
use crate::registry::Registry;
use crate::{Error, Result};

const NODE_TYPE: &str = "nodeType";
const TYPE: &str = "type";
const VAL: &str = "val";
const FROM_OP: &str = "fromOp";
const NAME: &str = "name";
const INPUTS: &str = "inputs";

impl Node {
    /// Writes the tree rooted at this node in its JSON form.
    ///
    /// Composite nodes only exist in compiled graphs and cannot be written.
    pub fn to_json(&self) -> Result<Value> {
        let order = self.walk();

        // Remaining consumers per node; the last one takes the value.
        let mut uses: HashMap<Digest, usize> = HashMap::new();
        for node in &order {
            for input in node.inputs().into_iter().flat_map(|inputs| inputs.values()) {
                *uses.entry(input.digest()).or_default() += 1;
            }
        }

        let mut written: HashMap<Digest, Value> = HashMap::with_capacity(order.len());
        for node in &order {
            let ty = serde_json::to_value(node.output_type())?;
            let json = match node.kind() {
                NodeKind::Const { value } => {
                    let mut object = Map::new();
                    object.insert(NODE_TYPE.into(), "const".into());
                    object.insert(TYPE.into(), ty);
                    object.insert(VAL.into(), value.clone());
                    Value::Object(object)
                }
                NodeKind::Output { op, .. } if op.is_composite() => {
                    return Err(Error::InvalidGraph(format!(
                        "composite `{}` has no JSON form",
                        op.name()
                    )));
                }
                NodeKind::Output { op, inputs } => {
                    let mut args = Map::new();
                    for (param, input) in inputs.iter() {
                        let digest = input.digest();
                        let remaining = uses.entry(digest).or_default();
                        *remaining = remaining.saturating_sub(1);
                        let value = if *remaining == 0 {
                            written.remove(&digest)
                        } else {
                            written.get(&digest).cloned()
                        };
                        let value = value.ok_or_else(|| {
                            Error::Internal(format!("input `{param}` of `{}` was not written", op.name()))
                        })?;
                        args.insert(param.to_owned(), value);
                    }

                    let mut from_op = Map::new();
                    from_op.insert(NAME.into(), op.name().into());
                    from_op.insert(INPUTS.into(), Value::Object(args));

                    let mut object = Map::new();
                    object.insert(NODE_TYPE.into(), "output".into());
                    object.insert(TYPE.into(), ty);
                    object.insert(FROM_OP.into(), Value::Object(from_op));
                    Value::Object(object)
                }
            };
            written.insert(node.digest(), json);
        }

        written
            .remove(&self.digest())
            .ok_or_else(|| Error::Internal("root was not written".into()))
    }

    /// Rebuilds a tree from its JSON form.
    ///
    /// Every output node goes through [`Node::call`], so the rebuilt tree is
    /// validated against `registry`. The declared types must match the ones
    /// the registry derives.
    pub fn from_json(registry: &Registry, json: &Value) -> Result<Self> {
        let mut built: Vec<Node> = Vec::new();
        let mut stack: Vec<(&Value, bool)> = vec![(json, false)];

        while let Some((json, expanded)) = stack.pop() {
            let object = json
                .as_object()
                .ok_or_else(|| Error::InvalidGraph(format!("expected a node, got {json}")))?;
            let ty = object
                .get(TYPE)
                .map(Type::deserialize)
                .transpose()?
                .ok_or_else(|| Error::InvalidGraph(format!("node has no `{TYPE}`")))?;

            match object.get(NODE_TYPE).and_then(Value::as_str) {
                Some("const") => {
                    let value = object.get(VAL).cloned().unwrap_or(Value::Null);
                    built.push(Node::constant(ty, value));
                }
                Some("output") => {
                    let (name, inputs) = from_op(object)?;
                    if !expanded {
                        stack.push((json, true));
                        // Reversed, so inputs are built in order.
                        stack.extend(inputs.values().rev().map(|input| (input, false)));
                        continue;
                    }

                    let start = built.len().checked_sub(inputs.len()).ok_or_else(|| {
                        Error::Internal(format!("inputs of `{name}` were not built"))
                    })?;
                    let args = inputs.keys().cloned().zip(built.drain(start..));
                    let node = Node::call(registry, name, args.collect::<Vec<_>>())?;
                    if node.output_type() != &ty {
                        return Err(Error::InvalidGraph(format!(
                            "`{name}` declares type {ty} but its inputs produce {}",
                            node.output_type()
                        )));
                    }
                    built.push(node);
                }
                other => {
                    return Err(Error::InvalidGraph(format!("unknown node type {other:?}")));
                }
            }
        }

        match (built.pop(), built.is_empty()) {
            (Some(root), true) => Ok(root),
            _ => Err(Error::Internal("graph did not rebuild to one root".into())),
        }
    }
}

/// Returns the operation name and inputs of an output node.
fn from_op(object: &Map<String, Value>) -> Result<(&str, &Map<String, Value>)> {
    let from_op = object.get(FROM_OP).and_then(Value::as_object);
    let name = from_op.and_then(|op| op.get(NAME)).and_then(Value::as_str);
    let inputs = from_op.and_then(|op| op.get(INPUTS)).and_then(Value::as_object);
    match (name, inputs) {
        (Some(name), Some(inputs)) => Ok((name, inputs)),
        _ => Err(Error::InvalidGraph(format!(
            "output node needs `{FROM_OP}.{NAME}` and `{FROM_OP}.{INPUTS}`"
        ))),
    }
}
