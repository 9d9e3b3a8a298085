//! Compiler configuration.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for the graph compiler.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Whether chains are fused into composite remote calls.
    #[builder(default = "true")]
    pub pushdown: bool,

    /// Whether constant inputs of value-dependent operations are folded.
    #[builder(default = "true")]
    pub fold_constants: bool,

    /// Maximum number of fusion passes before giving up on a fixpoint.
    #[builder(default = "8")]
    pub max_passes: usize,
}

impl CompilerConfig {
    /// Returns a configuration with pushdown disabled.
    pub fn without_pushdown() -> Self {
        Self {
            pushdown: false,
            ..Self::default()
        }
    }

    /// Checks values that deserialization does not.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_passes == 0 {
            return Err("max_passes must be at least 1".into());
        }
        Ok(())
    }
}

impl CompilerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_passes
            && max == 0
        {
            return Err("max_passes must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            pushdown: true,
            fold_constants: true,
            max_passes: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = CompilerConfigBuilder::default().build().unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_builder_rejects_zero_passes() {
        let err = CompilerConfigBuilder::default().max_passes(0usize).build();
        assert!(err.is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CompilerConfig = serde_json::from_str(r#"{"pushdown": false}"#).unwrap();
        assert!(!config.pushdown);
        assert_eq!(config.max_passes, 8);
    }

    #[test]
    fn test_deserialized_zero_passes_is_invalid() {
        let config: CompilerConfig = serde_json::from_str(r#"{"maxPasses": 0}"#).unwrap();
        assert!(config.validate().is_err());
        assert!(CompilerConfig::default().validate().is_ok());
    }
}
