//! Tag store trait and common types for tagging backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binding::TagBinding;

/// Errors that can occur during tag store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The target resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The API is rate limiting us.
    #[error("Throttled by tagging API")]
    Throttled { retry_after_secs: Option<u64> },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether repeating the same call later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500,
            Self::Throttled { .. } => true,
            Self::NotFound(_) | Self::Config(_) | Self::Serialization(_) => false,
        }
    }
}

/// A key/value tag on a remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Resource carrying the tag.
    pub resource_id: String,
    /// Tag key.
    pub key: String,
    /// Tag value.
    #[serde(default)]
    pub value: String,
}

impl Tag {
    /// Create a tag.
    #[must_use]
    pub fn new(
        resource_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<&TagBinding> for Tag {
    fn from(binding: &TagBinding) -> Self {
        Self::new(binding.resource_id(), binding.key(), binding.value())
    }
}

/// Filter for [`TagStore::list_tags`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagFilter {
    /// Resource whose tags are listed.
    pub resource_id: String,
    /// Only tags with this key.
    pub key: Option<String>,
    /// Only tags with this value.
    pub value: Option<String>,
}

impl TagFilter {
    /// All tags on a resource.
    #[must_use]
    pub fn resource(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            ..Self::default()
        }
    }

    /// Restrict to one key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Restrict to one value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Whether `tag` passes this filter.
    #[must_use]
    pub fn matches(&self, tag: &Tag) -> bool {
        tag.resource_id == self.resource_id
            && self.key.as_ref().map_or(true, |k| *k == tag.key)
            && self.value.as_ref().map_or(true, |v| *v == tag.value)
    }
}

impl From<&TagBinding> for TagFilter {
    fn from(binding: &TagBinding) -> Self {
        Self::resource(binding.resource_id())
            .with_key(binding.key())
            .with_value(binding.value())
    }
}

/// Trait for remote tagging backends.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Attach a tag to its resource.
    ///
    /// Must succeed when the identical tag already exists.
    async fn add_tag(&self, tag: &Tag) -> Result<(), StoreError>;

    /// List tags matching `filter`.
    async fn list_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>, StoreError>;

    /// Remove exactly this key/value tag from its resource.
    ///
    /// Removing a tag that does not exist is not an error.
    async fn remove_tag(&self, tag: &Tag) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: TagStore + ?Sized> TagStore for std::sync::Arc<S> {
    async fn add_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        (**self).add_tag(tag).await
    }

    async fn list_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>, StoreError> {
        (**self).list_tags(filter).await
    }

    async fn remove_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        (**self).remove_tag(tag).await
    }
}
