//! Deterministic identity for a tag binding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix carried by every identity string.
const ID_PREFIX: &str = "ec2tag-";

/// Persisted handle of a tag binding.
///
/// Formatted as `ec2tag-<n>` where `n` is the CRC-32 (IEEE) checksum of
/// `"<resource_id>-<key>-<value>"` in decimal. Existing state written by
/// other tooling uses the same scheme, so the format must not change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    /// Borrow the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TagId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the identity of a `(resource_id, key, value)` triple.
///
/// Pure and total: any strings hash, valid or not.
#[must_use]
pub fn identity(resource_id: &str, key: &str, value: &str) -> TagId {
    let checksum = crc32fast::hash(format!("{resource_id}-{key}-{value}").as_bytes());
    TagId(format!("{ID_PREFIX}{checksum}"))
}
