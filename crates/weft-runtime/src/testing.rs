//! Shared fixtures for unit tests.
//!
//! A small catalog over a "store" domain: `root-store(name)` loads a store,
//! `store-items(store)` lists its items and `store-name(store)` returns its
//! name. `count` fuses with both into `store-itemCount`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use weft_core::{Resolved, Type};

use crate::registry::{FusionPattern, Operation, Param, PushdownSpec, Registry, Signature, TagBehavior};
use crate::remote::{CompositeCall, RemoteExecutor};

fn number_add(lhs: &Value, rhs: &Value) -> Value {
    match (lhs.as_i64(), rhs.as_i64()) {
        (Some(a), Some(b)) => json!(a + b),
        _ => json!(lhs.as_f64().unwrap_or_default() + rhs.as_f64().unwrap_or_default()),
    }
}

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_all([
            Operation::local(
                "number-add",
                Signature::new([Param::new("lhs", Type::Number), Param::new("rhs", Type::Number)])
                    .returns(Type::Number),
                |args| {
                    let lhs = args.value("lhs").cloned().unwrap_or_default();
                    let rhs = args.value("rhs").cloned().unwrap_or_default();
                    Ok(number_add(&lhs, &rhs))
                },
            ),
            Operation::local(
                "string-add",
                Signature::new([Param::new("lhs", Type::String), Param::new("rhs", Type::String)])
                    .returns(Type::String),
                |args| {
                    let lhs = args.str("lhs").unwrap_or_default();
                    let rhs = args.str("rhs").unwrap_or_default();
                    Ok(json!(format!("{lhs}{rhs}")))
                },
            ),
            Operation::local(
                "tag-as",
                Signature::new([Param::new("value", Type::Any), Param::new("source", Type::String)])
                    .derive(|inputs| {
                        inputs
                            .get("value")
                            .map(|ty| ty.untagged().clone())
                            .unwrap_or(Type::Any)
                    }),
                |args| Ok(args.value("value").cloned().unwrap_or_default()),
            )
            .with_tags(TagBehavior::tag("source", "source")),
            Operation::local(
                "fail",
                Signature::new([Param::new("message", Type::String)]).returns(Type::Number),
                |args| Err(args.str("message").unwrap_or("failed").to_owned().into()),
            ),
            Operation::local(
                "pick",
                Signature::new([
                    Param::new("obj", Type::dict(Type::Any)),
                    Param::new("key", Type::String),
                ])
                .value_dependent("key", Type::Any, |inputs, key| {
                    inputs
                        .get("obj")
                        .zip(key.as_str())
                        .and_then(|(obj, key)| obj.property_type(key))
                        .unwrap_or(Type::Invalid)
                }),
                |args| {
                    let key = args.str("key").unwrap_or_default();
                    Ok(args
                        .value("obj")
                        .and_then(|obj| obj.get(key))
                        .cloned()
                        .unwrap_or(Value::Null))
                },
            ),
            Operation::remote_root(
                "root-store",
                Signature::new([Param::new("name", Type::String)]).returns(Type::object("store")),
            ),
            Operation::remote(
                "store-items",
                Signature::new([Param::new("store", Type::object("store"))])
                    .returns(Type::list(Type::Int)),
            ),
            Operation::remote(
                "store-name",
                Signature::new([Param::new("store", Type::object("store"))]).returns(Type::String),
            ),
            Operation::local(
                "count",
                Signature::new([Param::new("arr", Type::list(Type::Any))]).returns(Type::Int),
                |args| {
                    let len = args
                        .value("arr")
                        .and_then(Value::as_array)
                        .map(Vec::len)
                        .unwrap_or_default();
                    Ok(json!(len))
                },
            )
            .with_pushdown(PushdownSpec::new().with_pattern(FusionPattern::new(
                "store",
                "itemCount",
                ["root-store", "store-items", "count"],
            ))),
        ])
        .expect("fixture registry is valid");
    registry
}

/// Remote executor over three stores (`a`, `b`, `c`), each holding three
/// items. Records every call.
#[derive(Default)]
pub struct MockRemote {
    calls: Mutex<Vec<CompositeCall>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockRemote {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<CompositeCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn run(call: &CompositeCall) -> weft_core::Result<Value> {
        let mut current = call.input.clone().unwrap_or(Value::Null);
        for step in &call.steps {
            current = match step.op.as_str() {
                "root-store" => match step.arg("name").and_then(Value::as_str) {
                    Some(name @ ("a" | "b" | "c")) => json!({"name": name, "items": [1, 2, 3]}),
                    other => {
                        return Err(weft_core::Error::not_found()
                            .with_message(format!("no store named {other:?}")));
                    }
                },
                "store-items" => current["items"].clone(),
                "store-name" => current["name"].clone(),
                "count" => json!(current.as_array().map(Vec::len).unwrap_or_default()),
                other => {
                    return Err(weft_core::Error::unsupported()
                        .with_message(format!("unknown step `{other}`")));
                }
            };
        }
        Ok(current)
    }
}

#[async_trait]
impl RemoteExecutor for MockRemote {
    async fn execute(&self, call: CompositeCall) -> weft_core::Result<Resolved> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Self::run(&call).map(Resolved::infer)
    }
}
