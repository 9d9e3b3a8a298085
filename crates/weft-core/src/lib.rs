#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod digest;
mod error;
pub mod types;
mod value;

#[doc(hidden)]
pub mod prelude;

pub use digest::{Digest, DigestBuilder};
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use types::{TagTypes, Type};
pub use value::{Resolved, Value};
