#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod expr;
pub mod ops;
pub mod pushdown;
pub mod types;

use weft_runtime::registry::Registry;

pub use expr::Expr;

/// Tracing target for operation registration and fusion builders.
pub const TRACING_TARGET: &str = "weft_ops";

/// Creates a registry holding every operation of this crate.
pub fn registry() -> weft_runtime::Result<Registry> {
    let mut registry = Registry::new();
    registry.register_all(ops::operations())?;

    tracing::debug!(
        target: TRACING_TARGET,
        operations = registry.len(),
        "registered operations"
    );
    Ok(registry)
}
