#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod backend;
mod dataset;
mod publisher;

pub use backend::{MemoryBackend, MemoryBackendConfig};
pub use dataset::{Dataset, Entity, Project, Run, RunQueue};
pub use publisher::{ARTIFACT_SCHEME, Artifact, MemoryPublisher};
