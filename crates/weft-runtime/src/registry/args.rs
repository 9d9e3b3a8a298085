//! Ordered, named arguments.

use weft_core::{Resolved, Type, Value};

/// Ordered mapping from parameter names to arguments.
///
/// Order follows the operation's signature. Holds [`Type`]s while a node is
/// being built and [`Resolved`] values while it is being evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Args<T> {
    entries: Vec<(String, T)>,
}

impl<T> Args<T> {
    /// Creates arguments from `(name, value)` pairs.
    pub fn new(entries: Vec<(String, T)>) -> Self {
        Self { entries }
    }

    /// Returns the argument named `name`.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the first argument.
    pub fn first(&self) -> Option<&T> {
        self.entries.first().map(|(_, v)| v)
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, argument)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Iterates arguments in order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Iterates parameter names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Removes every argument, yielding the values in order.
    pub(crate) fn drain_values(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..).map(|(_, v)| v)
    }

    /// Maps every argument, keeping names and order.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Args<U> {
        Args {
            entries: self
                .entries
                .iter()
                .map(|(n, v)| (n.clone(), f(v)))
                .collect(),
        }
    }
}

impl Args<Resolved> {
    /// Returns the value of the argument named `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).map(Resolved::value)
    }

    /// Returns the string value of the argument named `name`.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// Returns the integer value of the argument named `name`.
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_i64)
    }
}

impl Args<Type> {
    /// Renders the argument types, e.g. `arr: list<int>, n: int`.
    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .map(|(n, t)| format!("{n}: {t}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<T> Default for Args<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> FromIterator<(String, T)> for Args<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_lookup_and_order() {
        let args = Args::new(vec![
            ("arr".to_owned(), Type::list(Type::Int)),
            ("n".to_owned(), Type::Int),
        ]);

        assert_eq!(args.get("n"), Some(&Type::Int));
        assert_eq!(args.first(), Some(&Type::list(Type::Int)));
        assert_eq!(args.names().collect::<Vec<_>>(), ["arr", "n"]);
        assert_eq!(args.describe(), "arr: list<int>, n: int");
    }

    #[test]
    fn test_resolved_accessors() {
        let args: Args<Resolved> = [
            ("key".to_owned(), Resolved::infer(json!("loss"))),
            ("n".to_owned(), Resolved::infer(json!(3))),
        ]
        .into_iter()
        .collect();

        assert_eq!(args.str("key"), Some("loss"));
        assert_eq!(args.i64("n"), Some(3));
        assert_eq!(args.str("n"), None);
    }
}
