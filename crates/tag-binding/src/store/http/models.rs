//! Tagging API request and response models.

use serde::{Deserialize, Serialize};

use crate::store::Tag;

/// Key/value pair as sent to the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagPair {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

/// Body of `POST /resources/{id}/tags`.
#[derive(Debug, Serialize)]
pub struct AddTagsRequest {
    /// Tags to attach.
    pub tags: Vec<TagPair>,
}

/// Body of `GET /tags`.
#[derive(Debug, Deserialize)]
pub struct ListTagsResponse {
    /// Matching tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Error body returned by the API, when it sends one.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable message.
    #[serde(alias = "error")]
    pub message: String,
}
