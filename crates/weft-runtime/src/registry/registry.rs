//! Operation registry.

use std::collections::HashMap;
use std::sync::Arc;

use weft_core::Type;

use super::{Args, Operation};
use crate::{Error, Result};

/// Catalog of operations and their overloads.
///
/// Populated at startup, then shared behind an [`Arc`] by the compiler and
/// the engine. Sharing freezes it: registration needs `&mut self`.
#[derive(Debug, Default)]
pub struct Registry {
    operations: HashMap<String, Vec<Arc<Operation>>>,
    order: Vec<String>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation as a new name or as an overload of an
    /// existing one.
    ///
    /// Overloads must take the same parameter names and differ in at least
    /// one parameter type.
    pub fn register(&mut self, operation: Operation) -> Result<Arc<Operation>> {
        let name = operation.name().to_owned();
        if let Some(existing) = self.operations.get(&name) {
            for other in existing {
                if !other.signature().has_same_params(operation.signature()) {
                    return Err(Error::duplicate(
                        &name,
                        format!(
                            "overload parameters ({}) differ from ({})",
                            operation.signature().param_names().collect::<Vec<_>>().join(", "),
                            other.signature().param_names().collect::<Vec<_>>().join(", "),
                        ),
                    ));
                }
                if other.signature().has_same_param_types(operation.signature()) {
                    return Err(Error::duplicate(&name, "an identical overload exists"));
                }
            }
        }

        tracing::trace!(
            target: crate::TRACING_TARGET,
            op = %name,
            version = %operation.version(),
            "registered operation"
        );

        let operation = Arc::new(operation);
        match self.operations.get_mut(&name) {
            Some(overloads) => overloads.push(operation.clone()),
            None => {
                self.order.push(name.clone());
                self.operations.insert(name, vec![operation.clone()]);
            }
        }
        Ok(operation)
    }

    /// Registers every operation in order.
    pub fn register_all(&mut self, operations: impl IntoIterator<Item = Operation>) -> Result<()> {
        for operation in operations {
            self.register(operation)?;
        }
        Ok(())
    }

    /// Resolves the most specific overload accepting `inputs`.
    ///
    /// `inputs` must be in signature order. Among equally specific
    /// overloads the first registered wins.
    pub fn resolve(&self, name: &str, inputs: &Args<Type>) -> Result<Arc<Operation>> {
        let no_match = || Error::NoMatchingOverload {
            op: name.to_owned(),
            inputs: inputs.describe(),
        };

        let mut best: Option<&Arc<Operation>> = None;
        for candidate in self.overloads(name) {
            if !candidate.signature().accepts(inputs) {
                continue;
            }
            best = match best {
                Some(current)
                    if !candidate
                        .signature()
                        .is_at_least_as_specific_as(current.signature())
                        || current
                            .signature()
                            .is_at_least_as_specific_as(candidate.signature()) =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            };
        }

        best.cloned().ok_or_else(no_match)
    }

    /// Returns the first registered overload of `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<Operation>> {
        self.operations.get(name).and_then(|ops| ops.first())
    }

    /// Returns every overload of `name` in registration order.
    pub fn overloads(&self, name: &str) -> &[Arc<Operation>] {
        self.operations.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns `true` if `operation` is one of the registered overloads.
    pub fn contains(&self, operation: &Arc<Operation>) -> bool {
        self.overloads(operation.name())
            .iter()
            .any(|op| Arc::ptr_eq(op, operation))
    }

    /// Returns the number of operation names.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates operation names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::{Param, Signature};

    fn count(ty: Type, result: i64) -> Operation {
        Operation::local(
            "count",
            Signature::new([Param::new("arr", ty)]).returns(Type::Int),
            move |_| Ok(json!(result)),
        )
    }

    fn args(ty: Type) -> Args<Type> {
        Args::new(vec![("arr".to_owned(), ty)])
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = Registry::new();
        registry.register(count(Type::list(Type::Any), 0)).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("count").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), ["count"]);
    }

    #[test]
    fn test_rejects_duplicate_overload() {
        let mut registry = Registry::new();
        registry.register(count(Type::list(Type::Any), 0)).unwrap();

        let err = registry.register(count(Type::list(Type::Any), 1)).unwrap_err();
        assert!(matches!(err, Error::DuplicateOperation { .. }));
    }

    #[test]
    fn test_rejects_incompatible_params() {
        let mut registry = Registry::new();
        registry.register(count(Type::list(Type::Any), 0)).unwrap();

        let renamed = Operation::local(
            "count",
            Signature::new([Param::new("obj", Type::dict(Type::Any))]),
            |_| Ok(json!(0)),
        );
        let err = registry.register(renamed).unwrap_err();
        assert!(matches!(err, Error::DuplicateOperation { .. }));
    }

    #[test]
    fn test_resolve_most_specific() {
        let mut registry = Registry::new();
        let general = registry.register(count(Type::list(Type::Any), 0)).unwrap();
        let narrow = registry.register(count(Type::list(Type::Int), 1)).unwrap();

        let picked = registry.resolve("count", &args(Type::list(Type::Int))).unwrap();
        assert!(Arc::ptr_eq(&picked, &narrow));

        let picked = registry.resolve("count", &args(Type::list(Type::String))).unwrap();
        assert!(Arc::ptr_eq(&picked, &general));
    }

    #[test]
    fn test_resolve_order_independent_of_specificity() {
        let mut registry = Registry::new();
        let narrow = registry.register(count(Type::list(Type::Int), 1)).unwrap();
        registry.register(count(Type::list(Type::Any), 0)).unwrap();

        let picked = registry.resolve("count", &args(Type::list(Type::Int))).unwrap();
        assert!(Arc::ptr_eq(&picked, &narrow));
    }

    #[test]
    fn test_resolve_ties_first_registered() {
        let mut registry = Registry::new();
        let first = registry
            .register(count(Type::union([Type::list(Type::Int), Type::String]), 0))
            .unwrap();
        registry
            .register(count(Type::union([Type::list(Type::Int), Type::Boolean]), 1))
            .unwrap();

        let picked = registry.resolve("count", &args(Type::list(Type::Int))).unwrap();
        assert!(Arc::ptr_eq(&picked, &first));
    }

    #[test]
    fn test_resolve_no_match() {
        let mut registry = Registry::new();
        registry.register(count(Type::list(Type::Any), 0)).unwrap();

        let err = registry.resolve("count", &args(Type::Int)).unwrap_err();
        assert!(matches!(err, Error::NoMatchingOverload { .. }));

        let err = registry.resolve("missing", &args(Type::Int)).unwrap_err();
        assert!(matches!(err, Error::NoMatchingOverload { .. }));
    }
}
