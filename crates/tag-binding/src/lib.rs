//! Declarative management of a single key/value tag on a cloud resource.
//!
//! A [`TagBinding`] is one `(resource_id, key, value)` triple. The crate lets
//! infrastructure tooling attach, verify and remove that one tag without
//! owning the definition of the resource it sits on.
//!
//! # Example
//!
//! ```rust,ignore
//! use tag_binding::{MemoryTagStore, TagBinding, TagController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let controller = TagController::new(MemoryTagStore::new());
//!     let binding = TagBinding::new("i-12345", "Name", "web-1")?;
//!
//!     // Attach the tag and confirm it is visible
//!     let created = controller.create(&binding).await?;
//!     let mut record = created.record;
//!
//!     // Later: detect drift
//!     controller.refresh(&mut record).await?;
//!
//!     // Remove it again
//!     controller.delete(&mut record).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`identity`] derives the stable [`TagId`] for a triple
//! - [`MutationLocks`] serializes mutations per resource id
//! - [`TagController`] implements create / read / delete against a
//!   [`TagStore`]
//! - [`store`] holds the store trait plus in-memory and HTTP implementations

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod binding;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod locks;
pub mod state;
pub mod store;

pub use binding::{TagBinding, ValidationError, Violation};
pub use config::{ConfigError, StoreConfig};
pub use controller::{ControllerConfig, Created, Presence, TagController, Visibility};
pub use error::{Operation, TagError};
pub use identity::{identity, TagId};
pub use locks::MutationLocks;
pub use state::TagRecord;
pub use store::{HttpTagStore, MemoryTagStore, StoreError, Tag, TagFilter, TagStore};
