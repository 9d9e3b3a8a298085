//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use weft_runtime::prelude::*;
//! ```

pub use weft_core::{Digest, Resolved, TagTypes, Type, Value};

pub use crate::compiler::{CompileStats, CompiledGraph, Compiler, CompilerConfig};
pub use crate::engine::{CacheScope, CacheStats, Engine, EngineConfig};
pub use crate::error::{Error, EvaluationCause, EvaluationError, Result};
pub use crate::graph::Node;
pub use crate::publish::Publisher;
pub use crate::registry::{
    Args, FusionPattern, Operation, Param, PushdownSpec, Registry, Signature, TagBehavior,
};
pub use crate::remote::{CallStep, CompositeCall, NoRemote, RemoteExecutor};
