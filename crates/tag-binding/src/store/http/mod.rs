//! HTTP tagging API backend.
//!
//! Implements the [`TagStore`](crate::store::TagStore) trait against a JSON
//! REST tagging endpoint with bearer-token auth.
//!
//! ## Endpoints
//!
//! - `POST /resources/{resource_id}/tags` attaches tags
//! - `GET /tags?resource-id=..&key=..&value=..` lists matching tags
//! - `DELETE /resources/{resource_id}/tags?key=..&value=..` removes one tag

mod client;
mod models;

pub use client::HttpTagStore;
pub use models::*;
