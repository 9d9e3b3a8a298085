//! In-memory publication.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;
use serde_json::Value;
use weft_core::{Digest, Error, Result};
use weft_runtime::publish::Publisher;

/// URI scheme of published artifacts.
pub const ARTIFACT_SCHEME: &str = "weft-artifact";

/// A published value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Name the value was published under.
    pub name: String,
    /// The published value.
    pub value: Value,
    /// Short content digest of the value.
    pub digest: String,
    /// When the value was first published.
    pub published_at: Timestamp,
}

/// Content-addressed publisher keeping artifacts in memory.
///
/// References have the form
/// `weft-artifact:///{namespace}/{name}:{digest}/obj`, where `digest` is the
/// first 20 hex characters of the SHA-256 of the value's canonical JSON.
/// Publishing an equal value under the same name returns the same
/// reference and keeps the original artifact.
#[derive(Debug)]
pub struct MemoryPublisher {
    namespace: String,
    artifacts: Mutex<HashMap<String, Artifact>>,
}

impl MemoryPublisher {
    /// Creates a publisher writing under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            artifacts: Mutex::new(HashMap::new()),
        }
    }

    fn stored(&self) -> MutexGuard<'_, HashMap<String, Artifact>> {
        self.artifacts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the reference `value` gets when published under `name`.
    pub fn reference(&self, name: &str, value: &Value) -> String {
        let digest = Digest::of_value(value).short();
        format!("{ARTIFACT_SCHEME}:///{}/{name}:{digest}/obj", self.namespace)
    }

    /// Returns the artifact behind a reference.
    pub fn get(&self, reference: &str) -> Option<Artifact> {
        self.stored().get(reference).cloned()
    }

    /// Returns the number of stored artifacts.
    pub fn len(&self) -> usize {
        self.stored().len()
    }

    /// Returns `true` if nothing was published.
    pub fn is_empty(&self) -> bool {
        self.stored().is_empty()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, name: &str, value: &Value) -> Result<String> {
        if name.is_empty() || name.contains(':') {
            return Err(Error::invalid_input()
                .with_message(format!("invalid artifact name {name:?}")));
        }

        let reference = self.reference(name, value);
        self.stored()
            .entry(reference.clone())
            .or_insert_with(|| Artifact {
                name: name.to_owned(),
                value: value.clone(),
                digest: Digest::of_value(value).short(),
                published_at: Timestamp::now(),
            });
        Ok(reference)
    }
}
