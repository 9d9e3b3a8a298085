//! Scalar operations.
//!
//! Arithmetic accepts missing values: `number-add` returns `null` when either
//! side is `null`, and its type reflects that.

use serde_json::{Value, json};
use weft_core::{BoxedError, Resolved, Type};
use weft_runtime::registry::{Args, Operation, Param, Signature};

use crate::types::maybe;

/// Returns the primitive operations.
pub fn operations() -> Vec<Operation> {
    vec![
        Operation::local(
            "isNone",
            Signature::new([Param::new("val", Type::Any)]).returns(Type::Boolean),
            |args| Ok(json!(args.value("val").is_none_or(Value::is_null))),
        ),
        Operation::local(
            "number-add",
            Signature::new([
                Param::new("lhs", maybe(Type::Number)),
                Param::new("rhs", maybe(Type::Number)),
            ])
            .derive(|inputs| {
                let definite = inputs.values().all(|ty| ty.is_assignable_to(&Type::Number));
                let ints = inputs.values().all(|ty| ty.is_assignable_to(&maybe(Type::Int)));
                let sum = if ints { Type::Int } else { Type::Number };
                if definite { sum } else { maybe(sum) }
            }),
            number_add,
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
    ]
}

fn number_add(args: &Args<Resolved>) -> Result<Value, BoxedError> {
    let (Some(lhs), Some(rhs)) = (args.value("lhs"), args.value("rhs")) else {
        return Ok(Value::Null);
    };
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }

    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64())
        && let Some(sum) = a.checked_add(b)
    {
        return Ok(json!(sum));
    }
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Ok(json!(a + b)),
        _ => Err(format!("cannot add {lhs} and {rhs}").into()),
    }
}
