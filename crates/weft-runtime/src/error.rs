//! Runtime error types.

use std::sync::Arc;

use thiserror::Error;
use weft_core::{BoxedError, Digest};

use crate::graph::Node;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while building, compiling or evaluating graphs.
#[derive(Debug, Error)]
pub enum Error {
    /// A node was constructed with unknown, missing or incompatible inputs.
    #[error("signature error for `{op}`: {message}")]
    Signature {
        /// Name of the operation being called.
        op: String,
        /// What is wrong with the call.
        message: String,
    },

    /// No registered overload accepts the given input types.
    #[error("no overload of `{op}` accepts ({inputs})")]
    NoMatchingOverload {
        /// Name of the operation being resolved.
        op: String,
        /// Rendered input types.
        inputs: String,
    },

    /// An operation was registered twice or with an incompatible signature.
    #[error("cannot register `{op}`: {message}")]
    DuplicateOperation {
        /// Name of the operation being registered.
        op: String,
        /// Why the registration was rejected.
        message: String,
    },

    /// Evaluating a node failed.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// A serialized graph could not be rebuilt.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The publication collaborator failed.
    #[error("publication failed: {0}")]
    Publish(#[source] weft_core::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a signature error.
    pub fn signature(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Signature {
            op: op.into(),
            message: message.into(),
        }
    }

    /// Creates a duplicate operation error.
    pub fn duplicate(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DuplicateOperation {
            op: op.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single node during evaluation.
///
/// Carries the failing node's identity. Ancestors of a failed node report
/// their own identity with an [`EvaluationCause::Upstream`] cause wrapping
/// the original error. Cheap to clone so that every caller sharing an
/// in-flight computation receives the same error.
#[derive(Debug, Clone, Error)]
#[error("evaluation of `{op}` [{}] failed: {cause}", .digest.short())]
pub struct EvaluationError {
    /// Name of the operation of the failing node.
    pub op: String,
    /// Structural digest of the failing node.
    pub digest: Digest,
    /// Underlying cause.
    #[source]
    pub cause: EvaluationCause,
}

/// Why a node failed to evaluate.
#[derive(Debug, Clone, Error)]
pub enum EvaluationCause {
    /// The local implementation returned an error.
    #[error("operation failed: {0}")]
    Operation(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// The remote execution collaborator returned an error.
    #[error("remote execution failed: {0}")]
    Remote(#[source] Arc<weft_core::Error>),

    /// An input of the node failed.
    #[error("input `{}` failed", .0.op)]
    Upstream(#[source] Box<EvaluationError>),

    /// The computation was lost, e.g. its task panicked.
    #[error("{0}")]
    Internal(String),
}

impl EvaluationError {
    /// Creates an error for `node` with the given cause.
    pub fn new(node: &Node, cause: EvaluationCause) -> Self {
        Self {
            op: node.name().to_owned(),
            digest: node.digest(),
            cause,
        }
    }

    /// Creates an error for a failed local implementation.
    pub fn operation(node: &Node, source: BoxedError) -> Self {
        Self::new(node, EvaluationCause::Operation(Arc::from(source)))
    }

    /// Creates an error for a failed remote call.
    pub fn remote(node: &Node, source: weft_core::Error) -> Self {
        Self::new(node, EvaluationCause::Remote(Arc::new(source)))
    }

    /// Creates an error for a node whose input failed.
    pub fn upstream(node: &Node, source: EvaluationError) -> Self {
        Self::new(node, EvaluationCause::Upstream(Box::new(source)))
    }

    /// Creates an internal error.
    pub fn internal(node: &Node, message: impl Into<String>) -> Self {
        Self::new(node, EvaluationCause::Internal(message.into()))
    }

    /// Returns `true` if this node failed because one of its inputs failed.
    pub fn is_upstream(&self) -> bool {
        matches!(self.cause, EvaluationCause::Upstream(_))
    }

    /// Follows upstream causes to the node that originally failed.
    pub fn origin(&self) -> &EvaluationError {
        let mut current = self;
        while let EvaluationCause::Upstream(inner) = &current.cause {
            current = inner;
        }
        current
    }
}
