//! Type lattice for values flowing through graph nodes.
//!
//! - [`Type`]: primitive kinds, containers, unions, domain objects and the
//!   [`Type::Tagged`] wrapper
//! - [`TagTypes`]: tag name to tag type mapping carried by tagged types

mod lattice;
mod tags;

pub use lattice::Type;
pub use tags::{TagTypes, merge_tags};
