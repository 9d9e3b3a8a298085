//! List and dict operations.

use serde_json::{Value, json};
use weft_core::{BoxedError, Type};
use weft_runtime::registry::{Args, Operation, Param, Signature};

use crate::pushdown;

/// Returns the collection operations.
pub fn operations() -> Vec<Operation> {
    vec![
        Operation::local(
            "count",
            Signature::new([Param::new("arr", Type::list(Type::Any))]).returns(Type::Int),
            count,
        )
        .with_pushdown(pushdown::count()),
        Operation::local(
            "count",
            Signature::new([Param::new("arr", Type::dict(Type::Any))]).returns(Type::Int),
            count,
        ),
        Operation::local(
            "limit",
            Signature::new([
                Param::new("arr", Type::list(Type::Any)),
                Param::new("limit", Type::Int),
            ])
            .derive(|inputs| list_of(inputs, |element| element.clone())),
            limit,
        )
        .with_pushdown(pushdown::limit()),
        Operation::local(
            "index",
            Signature::new([
                Param::new("arr", Type::list(Type::Any)),
                Param::new("index", Type::Int),
            ])
            .derive(|inputs| {
                inputs
                    .get("arr")
                    .and_then(Type::element_type)
                    .cloned()
                    .unwrap_or(Type::Any)
            }),
            index,
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
            pick,
        ),
        Operation::local(
            "pick",
            Signature::new([
                Param::new("obj", Type::list(Type::dict(Type::Any))),
                Param::new("key", Type::String),
            ])
            .value_dependent("key", Type::list(Type::Any), |inputs, key| {
                let key = key.as_str().unwrap_or_default();
                list_of(inputs, |row| row.property_type(key).unwrap_or(Type::Invalid))
            }),
            pick,
        ),
        Operation::local(
            "concat",
            Signature::new([Param::new("arr", Type::list(Type::list(Type::Any)))]).derive(
                |inputs| {
                    inputs
                        .get("arr")
                        .and_then(Type::element_type)
                        .map(|inner| inner.untagged().clone())
                        .unwrap_or_else(|| Type::list(Type::Any))
                },
            ),
            concat,
        ),
    ]
}

/// Maps the element type of input `arr` (or `obj`) into a new list type.
fn list_of(inputs: &Args<Type>, element: impl Fn(&Type) -> Type) -> Type {
    inputs
        .first()
        .and_then(Type::element_type)
        .map(|ty| Type::list(element(ty)))
        .unwrap_or_else(|| Type::list(Type::Any))
}

fn count(args: &Args<weft_core::Resolved>) -> Result<Value, BoxedError> {
    match args.value("arr") {
        Some(Value::Array(items)) => Ok(json!(items.len())),
        Some(Value::Object(map)) => Ok(json!(map.len())),
        other => Err(format!("cannot count {}", describe(other)).into()),
    }
}

fn limit(args: &Args<weft_core::Resolved>) -> Result<Value, BoxedError> {
    let limit = args
        .i64("limit")
        .and_then(|limit| usize::try_from(limit).ok())
        .ok_or("`limit` must be a non-negative integer")?;
    match args.value("arr") {
        Some(Value::Array(items)) => Ok(Value::Array(items.iter().take(limit).cloned().collect())),
        other => Err(format!("cannot limit {}", describe(other)).into()),
    }
}

fn index(args: &Args<weft_core::Resolved>) -> Result<Value, BoxedError> {
    let Some(Value::Array(items)) = args.value("arr") else {
        return Err(format!("cannot index {}", describe(args.value("arr"))).into());
    };
    let index = args.i64("index").ok_or("`index` must be an integer")?;
    let position = if index < 0 {
        i64::try_from(items.len()).ok().map(|len| len + index)
    } else {
        Some(index)
    };

    position
        .and_then(|i| usize::try_from(i).ok())
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or_else(|| format!("index {index} is out of range for {} items", items.len()).into())
}

fn pick(args: &Args<weft_core::Resolved>) -> Result<Value, BoxedError> {
    let key = args.str("key").ok_or("`key` must be a string")?;
    match args.value("obj") {
        Some(Value::Object(map)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        Some(Value::Array(rows)) => Ok(rows
            .iter()
            .map(|row| row.get(key).cloned().unwrap_or(Value::Null))
            .collect()),
        other => Err(format!("cannot pick `{key}` from {}", describe(other)).into()),
    }
}

fn concat(args: &Args<weft_core::Resolved>) -> Result<Value, BoxedError> {
    let Some(Value::Array(lists)) = args.value("arr") else {
        return Err(format!("cannot concat {}", describe(args.value("arr"))).into());
    };
    let mut out = Vec::new();
    for list in lists {
        match list {
            Value::Array(items) => out.extend(items.iter().cloned()),
            Value::Null => {}
            other => return Err(format!("cannot concat {other}").into()),
        }
    }
    Ok(Value::Array(out))
}

fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "a missing value".to_owned(), Value::to_string)
}
