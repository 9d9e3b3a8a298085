//! Remote execution collaborator.
//!
//! The engine describes every remote node as a [`CompositeCall`]: a short
//! pipeline of remote steps applied to an optional input value. Turning the
//! call into a wire query, authenticating and retrying belong to the
//! [`RemoteExecutor`] implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weft_core::{Resolved, Value};

/// One step of a remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStep {
    /// Remote operation name.
    pub op: String,
    /// Arguments by parameter name.
    pub args: BTreeMap<String, Value>,
}

impl CallStep {
    /// Creates a step.
    pub fn new(op: impl Into<String>, args: BTreeMap<String, Value>) -> Self {
        Self {
            op: op.into(),
            args,
        }
    }

    /// Returns the argument named `param`.
    pub fn arg(&self, param: &str) -> Option<&Value> {
        self.args.get(param)
    }
}

/// A remote call: steps applied in order, starting from `input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeCall {
    /// Operation name, the composite name for fused calls.
    pub name: String,
    /// Value the first step is applied to; `None` when it is a root step.
    pub input: Option<Value>,
    /// Steps in call order.
    pub steps: Vec<CallStep>,
}

impl CompositeCall {
    /// Returns `true` if the call was synthesized from a fused chain.
    pub fn is_fused(&self) -> bool {
        self.steps.len() != 1 || self.steps.first().is_some_and(|s| s.op != self.name)
    }

    /// Iterates the step operation names.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.op.as_str())
    }
}

/// Executes remote calls.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Executes `call` and returns its result.
    async fn execute(&self, call: CompositeCall) -> weft_core::Result<Resolved>;
}

/// Remote executor for engines without a remote service.
///
/// Every call fails with [`weft_core::ErrorKind::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemote;

#[async_trait]
impl RemoteExecutor for NoRemote {
    async fn execute(&self, call: CompositeCall) -> weft_core::Result<Resolved> {
        Err(weft_core::Error::unsupported()
            .with_message(format!("no remote service to execute `{}`", call.name)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_is_fused() {
        let single = CompositeCall {
            name: "project-runs".into(),
            input: Some(json!({"id": "p"})),
            steps: vec![CallStep::new("project-runs", BTreeMap::new())],
        };
        let fused = CompositeCall {
            name: "project-runCount".into(),
            input: Some(json!({"id": "p"})),
            steps: vec![
                CallStep::new("project-runs", BTreeMap::new()),
                CallStep::new("count", BTreeMap::new()),
            ],
        };

        assert!(!single.is_fused());
        assert!(fused.is_fused());
        assert_eq!(fused.step_names().collect::<Vec<_>>(), ["project-runs", "count"]);
    }

    #[tokio::test]
    async fn test_no_remote_fails() {
        let call = CompositeCall {
            name: "root-project".into(),
            input: None,
            steps: vec![],
        };
        let err = NoRemote.execute(call).await.unwrap_err();
        assert_eq!(err.kind(), weft_core::ErrorKind::Unsupported);
    }
}
