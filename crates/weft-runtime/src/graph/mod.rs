//! Lazy expression graphs.
//!
//! This module provides the graph representation that operations build:
//! - [`Node`]: immutable, structurally hashed graph unit (constant or
//!   operation output)
//! - [`NodeKind`]: what a node computes
//! - [`walk`]: post-order, deduplicated traversal of several roots
//!
//! Graphs can also be written to and rebuilt from a JSON form, see
//! [`Node::to_json`] and [`Node::from_json`].

mod json;
mod node;

pub use node::{Node, NodeKind, walk};
