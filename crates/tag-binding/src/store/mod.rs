//! Remote tag store abstractions.

pub mod http;
pub mod memory;
mod traits;

pub use http::HttpTagStore;
pub use memory::MemoryTagStore;
pub use traits::{StoreError, Tag, TagFilter, TagStore};
