//! Operation catalog.
//!
//! - [`domain`]: accessors of the run-tracking service, executed remotely
//! - [`collection`]: list and dict operations, executed locally and fused
//!   into remote calls where a pattern allows it
//! - [`primitive`]: scalar operations

pub mod collection;
pub mod domain;
pub mod primitive;

use weft_runtime::registry::Operation;

/// Returns every operation, in registration order.
pub fn operations() -> Vec<Operation> {
    let mut operations = domain::operations();
    operations.extend(collection::operations());
    operations.extend(primitive::operations());
    operations
}
