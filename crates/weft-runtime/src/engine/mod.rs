//! Graph execution engine.
//!
//! This module provides the runtime for evaluating compiled graphs:
//! - [`Engine`]: compiles, evaluates and publishes node trees
//! - [`EngineConfig`]: configuration options
//! - [`CacheScope`]: lifetime of cached node results
//! - [`CacheStats`]: cache counters

mod cache;
mod config;
mod executor;

pub use cache::CacheStats;
pub use config::{CacheScope, EngineConfig, EngineConfigBuilder};
pub use executor::Engine;
