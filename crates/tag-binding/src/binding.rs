//! The managed tag triple and its input constraints.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{identity, TagId};

/// Maximum tag key length, in characters.
pub const MAX_KEY_LEN: usize = 127;

/// Maximum tag value length, in characters.
pub const MAX_VALUE_LEN: usize = 255;

/// Key prefix reserved by the cloud provider.
pub const RESERVED_KEY_PREFIX: &str = "aws:";

/// A single constraint violated by a tag binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// Resource id is empty.
    #[error("\"resource_id\" must not be empty")]
    EmptyResourceId,

    /// Key is empty.
    #[error("\"key\" must not be empty")]
    EmptyKey,

    /// Key exceeds [`MAX_KEY_LEN`].
    #[error("\"key\" cannot be longer than {max} characters (got {len})")]
    KeyTooLong { len: usize, max: usize },

    /// Key starts with [`RESERVED_KEY_PREFIX`].
    #[error("\"key\" cannot begin with an {prefix:?} prefix")]
    ReservedKeyPrefix { prefix: &'static str },

    /// Value exceeds [`MAX_VALUE_LEN`].
    #[error("\"value\" cannot be longer than {max} characters (got {len})")]
    ValueTooLong { len: usize, max: usize },
}

/// Input rejected before any remote call was made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid tag binding: {}", join_violations(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// All constraints that failed, in field order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One `(resource_id, key, value)` tag managed on a remote resource.
///
/// Only constructible through [`TagBinding::new`] (or deserialization, which
/// goes through the same checks), so a value of this type always satisfies
/// the key and value constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTagBinding")]
pub struct TagBinding {
    resource_id: String,
    key: String,
    value: String,
}

/// Unchecked wire form of [`TagBinding`].
#[derive(Deserialize)]
struct RawTagBinding {
    resource_id: String,
    key: String,
    #[serde(default)]
    value: String,
}

impl TryFrom<RawTagBinding> for TagBinding {
    type Error = ValidationError;

    fn try_from(raw: RawTagBinding) -> Result<Self, Self::Error> {
        Self::new(raw.resource_id, raw.key, raw.value)
    }
}

impl TagBinding {
    /// Build a binding, checking every constraint.
    ///
    /// # Errors
    /// Returns [`ValidationError`] listing every violated constraint.
    pub fn new(
        resource_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let binding = Self {
            resource_id: resource_id.into(),
            key: key.into(),
            value: value.into(),
        };

        let violations = binding.violations();
        if violations.is_empty() {
            Ok(binding)
        } else {
            Err(ValidationError { violations })
        }
    }

    fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        if self.resource_id.is_empty() {
            violations.push(Violation::EmptyResourceId);
        }

        let key_len = self.key.chars().count();
        if key_len == 0 {
            violations.push(Violation::EmptyKey);
        }
        if key_len > MAX_KEY_LEN {
            violations.push(Violation::KeyTooLong {
                len: key_len,
                max: MAX_KEY_LEN,
            });
        }
        if self.key.starts_with(RESERVED_KEY_PREFIX) {
            violations.push(Violation::ReservedKeyPrefix {
                prefix: RESERVED_KEY_PREFIX,
            });
        }

        let value_len = self.value.chars().count();
        if value_len > MAX_VALUE_LEN {
            violations.push(Violation::ValueTooLong {
                len: value_len,
                max: MAX_VALUE_LEN,
            });
        }

        violations
    }

    /// Id of the resource carrying the tag.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Tag key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Tag value (may be empty).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Deterministic identity of this binding.
    #[must_use]
    pub fn id(&self) -> TagId {
        identity(&self.resource_id, &self.key, &self.value)
    }
}

impl fmt::Display for TagBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?} on {}", self.key, self.value, self.resource_id)
    }
}
