//! Publication collaborator.

use async_trait::async_trait;
use weft_core::Value;

/// Stores evaluated values and returns a content-addressed reference.
///
/// Publishing the same value under the same name must return the same
/// reference.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `value` under `name` and returns its reference.
    async fn publish(&self, name: &str, value: &Value) -> weft_core::Result<String>;
}
