//! Operation catalog.
//!
//! This module provides the typed operations nodes are built from:
//! - [`Registry`]: process-wide catalog, frozen once shared
//! - [`Operation`]: named, versioned function with tag behavior
//! - [`Signature`]: named, typed parameters and an output rule
//! - [`PushdownSpec`] / [`FusionPattern`]: how chains of operations fuse
//!   into composite remote calls
//! - [`Args`]: ordered, named arguments (types at build time, values at
//!   evaluation time)

mod args;
mod operation;
mod pushdown;
mod registry;
mod signature;

pub use args::Args;
pub use operation::{LocalFn, Operation, OperationKind, TagBehavior};
pub use pushdown::{
    ChainStep, CompositeBuilder, CompositeSpec, FusionPattern, PushdownSpec, StepArg,
    StepTemplate, arg_input_name, default_builder,
};
pub use registry::Registry;
pub use signature::{OutputRule, Param, Signature, TypeFn, ValueTypeFn};
