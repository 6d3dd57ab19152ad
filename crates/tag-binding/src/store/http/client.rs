//! Tagging API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::models::{AddTagsRequest, ApiErrorBody, ListTagsResponse, TagPair};
use crate::config::StoreConfig;
use crate::store::traits::{StoreError, Tag, TagFilter, TagStore};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tag store backed by a remote HTTP tagging API.
#[derive(Clone)]
pub struct HttpTagStore {
    /// HTTP client.
    client: Client,
    /// API root, e.g. `https://tags.example.com/v1`.
    base_url: Url,
    /// Bearer token, if the endpoint needs one.
    token: Option<String>,
}

impl std::fmt::Debug for HttpTagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTagStore")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl HttpTagStore {
    /// Create a new HTTP tag store.
    ///
    /// # Arguments
    /// * `base_url` - API root URL
    /// * `token` - Optional bearer token
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("Invalid API URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "API URL {base_url} cannot be used as a base"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Create a store from loaded configuration.
    ///
    /// # Errors
    /// Returns error if no API URL is configured or it is invalid.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config
            .api_url
            .as_deref()
            .ok_or_else(|| StoreError::Config("No tagging API URL configured".to_string()))?;
        Self::new(url, config.api_token.clone())
    }

    /// Build an endpoint URL from path segments, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn tags_endpoint(&self, resource_id: &str) -> Url {
        self.endpoint(&["resources", resource_id, "tags"])
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request whose success response has no body we care about.
    async fn send_empty(
        &self,
        request: RequestBuilder,
        allow_not_found: bool,
    ) -> Result<(), StoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status.is_success() || (allow_not_found && status == StatusCode::NOT_FOUND) {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    /// Convert a non-success response into a [`StoreError`].
    async fn error_from(response: reqwest::Response) -> StoreError {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return StoreError::Throttled { retry_after_secs };
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);

        if status == StatusCode::NOT_FOUND {
            StoreError::NotFound(message)
        } else {
            StoreError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[async_trait]
impl TagStore for HttpTagStore {
    async fn add_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        let url = self.tags_endpoint(&tag.resource_id);
        debug!(url = %url, key = %tag.key, "POST tags");

        let body = AddTagsRequest {
            tags: vec![TagPair {
                key: tag.key.clone(),
                value: tag.value.clone(),
            }],
        };

        self.send_empty(self.client.post(url).json(&body), false)
            .await
    }

    async fn list_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>, StoreError> {
        let mut url = self.endpoint(&["tags"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("resource-id", &filter.resource_id);
            if let Some(key) = &filter.key {
                query.append_pair("key", key);
            }
            if let Some(value) = &filter.value {
                query.append_pair("value", value);
            }
        }
        debug!(url = %url, "GET tags");

        let response = self.authorize(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let text = response.text().await?;
        let parsed: ListTagsResponse = serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, body = %text, "Failed to parse tag list");
            StoreError::Serialization(e)
        })?;

        // Servers are allowed to ignore filters they don't support
        Ok(parsed
            .tags
            .into_iter()
            .filter(|tag| filter.matches(tag))
            .collect())
    }

    async fn remove_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        let mut url = self.tags_endpoint(&tag.resource_id);
        url.query_pairs_mut()
            .append_pair("key", &tag.key)
            .append_pair("value", &tag.value);
        debug!(url = %url, "DELETE tag");

        self.send_empty(self.client.delete(url), true).await
    }
}
