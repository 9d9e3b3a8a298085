//! Engine configuration.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::compiler::CompilerConfig;

/// Lifetime of cached node results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// Results are shared by every evaluation on the engine.
    #[default]
    Process,
    /// Results are shared within one `evaluate` call only.
    Request,
    /// Nothing is cached; a sub-tree reached twice is computed twice.
    Disabled,
}

/// Configuration for the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Lifetime of cached results.
    #[builder(default)]
    pub cache_scope: CacheScope,

    /// Maximum number of remote calls in flight.
    #[builder(default = "16")]
    pub max_concurrent_remote_calls: usize,

    /// Configuration of the compiler run by `evaluate`.
    #[builder(default)]
    pub compiler: CompilerConfig,
}

impl EngineConfig {
    /// Checks values that deserialization does not.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_remote_calls == 0 {
            return Err("max_concurrent_remote_calls must be at least 1".into());
        }
        self.compiler
            .validate()
            .map_err(|message| format!("compiler.{message}"))
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_concurrent_remote_calls
            && max == 0
        {
            return Err("max_concurrent_remote_calls must be at least 1".into());
        }
        if let Some(compiler) = &self.compiler
            && compiler.max_passes == 0
        {
            return Err("compiler.max_passes must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_scope: CacheScope::Process,
            max_concurrent_remote_calls: 16,
            compiler: CompilerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfigBuilder::default().build().unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_builder_rejects_zero_remote_calls() {
        let err = EngineConfigBuilder::default()
            .max_concurrent_remote_calls(0usize)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn test_cache_scope_names() {
        assert_eq!(CacheScope::Request.to_string(), "request");
        assert_eq!(CacheScope::from_str("disabled").unwrap(), CacheScope::Disabled);
        assert!(CacheScope::from_str("forever").is_err());
    }

    #[test]
    fn test_deserialize() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"cacheScope": "request", "compiler": {"pushdown": false}}"#)
                .unwrap();
        assert_eq!(config.cache_scope, CacheScope::Request);
        assert!(!config.compiler.pushdown);
        assert_eq!(config.max_concurrent_remote_calls, 16);
    }

    #[test]
    fn test_deserialized_values_are_validated() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"maxConcurrentRemoteCalls": 0}"#).unwrap();
        assert!(config.validate().is_err());

        let config: EngineConfig =
            serde_json::from_str(r#"{"compiler": {"maxPasses": 0}}"#).unwrap();
        assert!(config.validate().unwrap_err().starts_with("compiler."));
    }
}
