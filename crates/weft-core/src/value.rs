//! Evaluated values.

use serde::{Deserialize, Serialize};

use crate::types::Type;

/// Runtime representation of every value flowing through a graph.
pub type Value = serde_json::Value;

/// A value together with its resolved type.
///
/// The resolved type may be narrower than the declared type of the node
/// that produced it, e.g. a remote summary resolves to a typed dict while
/// the node only declares a dict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolved {
    /// The value itself.
    pub value: Value,
    /// The resolved type of the value.
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Resolved {
    /// Creates a resolved value with an explicit type.
    pub fn new(value: Value, ty: Type) -> Self {
        Self { value, ty }
    }

    /// Creates a resolved value, inferring its type from the value.
    pub fn infer(value: Value) -> Self {
        let ty = Type::from_value(&value);
        Self { value, ty }
    }

    /// Returns a reference to the value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the resolved type.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Consumes and returns the value.
    pub fn into_value(self) -> Value {
        self.value
    }
}
