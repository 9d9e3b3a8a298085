#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod compiler;
pub mod engine;
mod error;
pub mod graph;
pub mod publish;
pub mod registry;
pub mod remote;

#[doc(hidden)]
pub mod prelude;

#[cfg(test)]
mod testing;

pub use error::{Error, EvaluationCause, EvaluationError, Result};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "weft_runtime";

/// Tracing target for graph compilation.
pub const TRACING_TARGET_COMPILER: &str = "weft_runtime::compiler";

/// Tracing target for graph evaluation.
pub const TRACING_TARGET_ENGINE: &str = "weft_runtime::engine";
