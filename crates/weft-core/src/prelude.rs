//! Convenient re-exports for common use.

pub use crate::digest::{Digest, DigestBuilder};
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::types::{TagTypes, Type};
pub use crate::value::{Resolved, Value};
