//! Types of the run-tracking domain.

use weft_core::Type;

/// Kind of [`project`] objects.
pub const PROJECT: &str = "project";

/// Kind of [`run`] objects.
pub const RUN: &str = "run";

/// Kind of [`run_queue`] objects.
pub const RUN_QUEUE: &str = "runQueue";

/// A project of an entity.
pub fn project() -> Type {
    Type::object(PROJECT)
}

/// A logged run.
pub fn run() -> Type {
    Type::object(RUN)
}

/// A launch queue.
pub fn run_queue() -> Type {
    Type::object(RUN_QUEUE)
}

/// A row of run history.
pub fn history_row() -> Type {
    Type::dict(Type::Any)
}

/// Final metrics of a run.
pub fn summary() -> Type {
    Type::dict(Type::Number)
}

/// `ty` or [`Type::None`].
pub fn maybe(ty: Type) -> Type {
    Type::union([ty, Type::None])
}

/// Returns the object kind of `ty` or of its elements.
pub fn object_kind(ty: &Type) -> Option<&str> {
    match ty.untagged() {
        Type::Object { kind } => Some(kind),
        Type::List { object_type } => match object_type.untagged() {
            Type::Object { kind } => Some(kind),
            _ => None,
        },
        _ => None,
    }
}
