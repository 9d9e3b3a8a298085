//! The [`Type`] lattice.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tags::{TagTypes, merge_tags};

/// Shape of the data flowing through a graph node.
///
/// Types form a lattice ordered by [`Type::is_assignable_to`]: [`Type::Any`]
/// is the top, [`Type::Invalid`] is assignable to nothing. [`Type::Tagged`]
/// wraps a payload type with provenance tags that propagate through
/// operations without affecting assignability of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Type {
    /// Result of a failed type computation.
    Invalid,
    /// The absence of a value.
    None,
    /// Any value.
    Any,
    /// `true` or `false`.
    Boolean,
    /// Integral number.
    Int,
    /// Floating point number.
    Float,
    /// Either [`Type::Int`] or [`Type::Float`].
    Number,
    /// UTF-8 string.
    String,
    /// Homogeneous list.
    List { object_type: Box<Type> },
    /// String-keyed map with homogeneous values.
    Dict { object_type: Box<Type> },
    /// String-keyed map with a known type per key.
    TypedDict { property_types: BTreeMap<String, Type> },
    /// Domain object of the remote service, e.g. `project` or `run`.
    Object { kind: String },
    /// Any one of the member types.
    Union { members: Vec<Type> },
    /// Payload type with provenance tags attached.
    Tagged { tags: TagTypes, value: Box<Type> },
}

impl Type {
    /// Creates a list type.
    pub fn list(object_type: Type) -> Self {
        Self::List {
            object_type: Box::new(object_type),
        }
    }

    /// Creates a dict type.
    pub fn dict(object_type: Type) -> Self {
        Self::Dict {
            object_type: Box::new(object_type),
        }
    }

    /// Creates a typed dict from `(key, type)` pairs.
    pub fn typed_dict<K: Into<String>>(properties: impl IntoIterator<Item = (K, Type)>) -> Self {
        Self::TypedDict {
            property_types: properties
                .into_iter()
                .map(|(key, ty)| (key.into(), ty))
                .collect(),
        }
    }

    /// Creates a domain object type.
    pub fn object(kind: impl Into<String>) -> Self {
        Self::Object { kind: kind.into() }
    }

    /// Creates a normalized union.
    ///
    /// Nested unions are flattened, duplicates and [`Type::Invalid`] members
    /// dropped, and a union containing [`Type::Any`] collapses to `Any`. A
    /// single remaining member is returned as is.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        for member in members {
            let nested = match member {
                Self::Union { members } => members,
                Self::Invalid => continue,
                other => vec![other],
            };
            for ty in nested {
                if ty == Self::Any {
                    return Self::Any;
                }
                if !flat.contains(&ty) {
                    flat.push(ty);
                }
            }
        }

        match flat.len() {
            0 => Self::Invalid,
            1 => flat.remove(0),
            _ => Self::Union { members: flat },
        }
    }

    /// Wraps `value` with `tags`.
    ///
    /// Empty tags return the payload unchanged; wrapping an already tagged
    /// type merges the tag maps, with `tags` winning on conflicts.
    pub fn tagged(tags: TagTypes, value: Type) -> Self {
        if tags.is_empty() {
            return value;
        }
        match value {
            Self::Tagged {
                tags: inner_tags,
                value,
            } => Self::Tagged {
                tags: merge_tags([&tags, &inner_tags]),
                value,
            },
            other => Self::Tagged {
                tags,
                value: Box::new(other),
            },
        }
    }

    /// Returns the payload type, stripping any tags.
    pub fn untagged(&self) -> &Type {
        match self {
            Self::Tagged { value, .. } => value,
            other => other,
        }
    }

    /// Returns the tags of this type, if tagged.
    pub fn tags(&self) -> Option<&TagTypes> {
        match self {
            Self::Tagged { tags, .. } => Some(tags),
            _ => None,
        }
    }

    /// Returns `true` if this type carries tags.
    pub fn is_tagged(&self) -> bool {
        matches!(self, Self::Tagged { .. })
    }

    /// Returns the element type of a (possibly tagged) list.
    pub fn element_type(&self) -> Option<&Type> {
        match self.untagged() {
            Self::List { object_type } => Some(object_type),
            _ => None,
        }
    }

    /// Returns the type stored under `key` for (possibly tagged) dicts.
    ///
    /// Unknown keys of a typed dict resolve to [`Type::None`], mirroring a
    /// missing entry at runtime.
    pub fn property_type(&self, key: &str) -> Option<Type> {
        match self.untagged() {
            Self::TypedDict { property_types } => {
                Some(property_types.get(key).cloned().unwrap_or(Self::None))
            }
            Self::Dict { object_type } => Some(Type::union([(**object_type).clone(), Self::None])),
            Self::Any => Some(Self::Any),
            _ => None,
        }
    }

    /// Returns `true` if a value of this type can be used where `other` is
    /// expected.
    pub fn is_assignable_to(&self, other: &Type) -> bool {
        match (self, other) {
            (Self::Invalid, _) => false,
            (_, Self::Any) => true,
            (Self::Union { members }, _) => members.iter().all(|m| m.is_assignable_to(other)),
            (_, Self::Tagged { tags: wanted, value }) => match self {
                Self::Tagged { tags, value: inner } => {
                    wanted.iter().all(|(name, want)| {
                        tags.get(name).is_some_and(|have| have.is_assignable_to(want))
                    }) && inner.is_assignable_to(value)
                }
                _ => false,
            },
            (Self::Tagged { value, .. }, _) => value.is_assignable_to(other),
            (_, Self::Union { members }) => members.iter().any(|m| self.is_assignable_to(m)),
            (Self::Int | Self::Float, Self::Number) => true,
            (Self::List { object_type: a }, Self::List { object_type: b }) => a.is_assignable_to(b),
            (Self::Dict { object_type: a }, Self::Dict { object_type: b }) => a.is_assignable_to(b),
            (Self::TypedDict { property_types }, Self::Dict { object_type }) => property_types
                .values()
                .all(|ty| ty.is_assignable_to(object_type)),
            (Self::TypedDict { property_types: a }, Self::TypedDict { property_types: b }) => b
                .iter()
                .all(|(key, want)| a.get(key).is_some_and(|have| have.is_assignable_to(want))),
            _ => self == other,
        }
    }

    /// Infers the most specific type of a JSON value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Int,
            Value::Number(_) => Self::Float,
            Value::String(_) => Self::String,
            Value::Array(items) if items.is_empty() => Self::list(Self::Any),
            Value::Array(items) => Self::list(Self::union(items.iter().map(Self::from_value))),
            Value::Object(map) => {
                Self::typed_dict(map.iter().map(|(k, v)| (k.clone(), Self::from_value(v))))
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => f.write_str("invalid"),
            Self::None => f.write_str("none"),
            Self::Any => f.write_str("any"),
            Self::Boolean => f.write_str("boolean"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::List { object_type } => write!(f, "list<{object_type}>"),
            Self::Dict { object_type } => write!(f, "dict<{object_type}>"),
            Self::TypedDict { property_types } => {
                f.write_str("{")?;
                for (i, (key, ty)) in property_types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {ty}")?;
                }
                f.write_str("}")
            }
            Self::Object { kind } => f.write_str(kind),
            Self::Union { members } => {
                for (i, ty) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{ty}")?;
                }
                Ok(())
            }
            Self::Tagged { tags, value } => {
                f.write_str("tagged<{")?;
                for (i, (name, ty)) in tags.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}, {value}>")
            }
        }
    }
}
