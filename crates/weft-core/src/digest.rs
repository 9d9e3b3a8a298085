//! Structural digests.
//!
//! A [`Digest`] identifies a graph node by its shape rather than by object
//! identity. Digests are SHA-256 over a length-prefixed, canonical encoding:
//! JSON objects are always written with sorted keys so that digests do not
//! depend on map ordering.

use derive_more::{Debug, Display};
use serde_json::Value;
use sha2::{Digest as _, Sha256};

use crate::types::Type;

/// Number of hex characters used by [`Digest::short`].
const SHORT_LEN: usize = 20;

/// SHA-256 structural digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Debug, Display)]
#[debug("{}", hex::encode(_0))]
#[display("{}", hex::encode(_0))]
pub struct Digest([u8; 32]);

impl Digest {
    /// Returns the raw digest bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the first 20 hex characters, used in logs and references.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_LEN);
        hex
    }

    /// Digests a JSON value on its own.
    pub fn of_value(value: &Value) -> Self {
        let mut builder = DigestBuilder::new("value");
        builder.value(value);
        builder.finish()
    }
}

/// Incremental builder for [`Digest`]s.
#[derive(Clone)]
pub struct DigestBuilder {
    hasher: Sha256,
}

impl DigestBuilder {
    /// Creates a builder whose digests are separated by `domain`.
    pub fn new(domain: &str) -> Self {
        let mut builder = Self {
            hasher: Sha256::new(),
        };
        builder.str(domain);
        builder
    }

    /// Appends a length-prefixed string.
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes())
    }

    /// Appends length-prefixed bytes.
    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    /// Appends another digest.
    pub fn digest(&mut self, digest: &Digest) -> &mut Self {
        self.hasher.update(digest.as_bytes());
        self
    }

    /// Appends a type through its canonical JSON form.
    pub fn ty(&mut self, ty: &Type) -> &mut Self {
        match serde_json::to_value(ty) {
            Ok(json) => self.value(&json),
            Err(_) => self.str(&ty.to_string()),
        }
    }

    /// Appends a JSON value in canonical form.
    pub fn value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Null => self.bytes(b"n"),
            Value::Bool(b) => self.bytes(if *b { b"t" } else { b"f" }),
            Value::Number(n) => {
                self.bytes(b"#");
                self.str(&n.to_string())
            }
            Value::String(s) => {
                self.bytes(b"s");
                self.str(s)
            }
            Value::Array(items) => {
                self.bytes(b"[");
                self.hasher.update((items.len() as u64).to_le_bytes());
                for item in items {
                    self.value(item);
                }
                self
            }
            Value::Object(map) => {
                self.bytes(b"{");
                self.hasher.update((map.len() as u64).to_le_bytes());
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (key, item) in entries {
                    self.str(key);
                    self.value(item);
                }
                self
            }
        }
    }

    /// Finalizes the digest.
    pub fn finish(self) -> Digest {
        Digest(self.hasher.finalize().into())
    }
}
