//! In-process tag store.
//!
//! Follows the semantics of EC2-style tagging: a resource holds at most one
//! value per key, adding an existing key overwrites its value, and removing
//! a key/value pair only takes effect when the stored value matches.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::traits::{StoreError, Tag, TagFilter, TagStore};

/// Tags per resource id, keys kept sorted.
type Tags = HashMap<String, BTreeMap<String, String>>;

/// Tag store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryTagStore {
    tags: RwLock<Tags>,
}

impl MemoryTagStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `tags`.
    #[must_use]
    pub fn with_tags(tags: impl IntoIterator<Item = Tag>) -> Self {
        let store = Self::new();
        {
            let mut map = store.write();
            for tag in tags {
                map.entry(tag.resource_id)
                    .or_default()
                    .insert(tag.key, tag.value);
            }
        }
        store
    }

    /// All tags currently on `resource_id`, ordered by key.
    #[must_use]
    pub fn tags_on(&self, resource_id: &str) -> Vec<Tag> {
        self.read()
            .get(resource_id)
            .map(|tags| {
                tags.iter()
                    .map(|(k, v)| Tag::new(resource_id, k, v))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop a key from a resource regardless of its value.
    ///
    /// Simulates a change made outside this system.
    pub fn remove_key(&self, resource_id: &str, key: &str) -> Option<String> {
        self.write()
            .get_mut(resource_id)
            .and_then(|tags| tags.remove(key))
    }

    /// Total number of tags across all resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().values().map(BTreeMap::len).sum()
    }

    /// Whether no tags are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tags> {
        self.tags.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tags> {
        self.tags.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn add_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        debug!(resource_id = %tag.resource_id, key = %tag.key, "Adding tag");
        self.write()
            .entry(tag.resource_id.clone())
            .or_default()
            .insert(tag.key.clone(), tag.value.clone());
        Ok(())
    }

    async fn list_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>, StoreError> {
        Ok(self
            .tags_on(&filter.resource_id)
            .into_iter()
            .filter(|tag| filter.matches(tag))
            .collect())
    }

    async fn remove_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        debug!(resource_id = %tag.resource_id, key = %tag.key, "Removing tag");
        let mut map = self.write();
        if let Some(tags) = map.get_mut(&tag.resource_id) {
            if tags.get(&tag.key) == Some(&tag.value) {
                tags.remove(&tag.key);
            }
            if tags.is_empty() {
                map.remove(&tag.resource_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let store = MemoryTagStore::new();
        let tag = Tag::new("i-1", "env", "prod");

        store.add_tag(&tag).await.unwrap();
        store.add_tag(&tag).await.unwrap();

        assert_eq!(store.tags_on("i-1"), vec![tag]);
    }

    #[tokio::test]
    async fn test_add_overwrites_value_for_same_key() {
        let store = MemoryTagStore::new();
        store.add_tag(&Tag::new("i-1", "env", "dev")).await.unwrap();
        store.add_tag(&Tag::new("i-1", "env", "prod")).await.unwrap();

        assert_eq!(store.tags_on("i-1"), vec![Tag::new("i-1", "env", "prod")]);
    }

    #[tokio::test]
    async fn test_remove_requires_matching_value() {
        let store = MemoryTagStore::with_tags([Tag::new("i-1", "env", "prod")]);

        store.remove_tag(&Tag::new("i-1", "env", "dev")).await.unwrap();
        assert_eq!(store.len(), 1);

        store.remove_tag(&Tag::new("i-1", "env", "prod")).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_tag_is_ok() {
        let store = MemoryTagStore::new();
        store
            .remove_tag(&Tag::new("i-404", "env", "prod"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_is_filtered_and_ordered() {
        let store = MemoryTagStore::with_tags([
            Tag::new("i-1", "zone", "a"),
            Tag::new("i-1", "env", "prod"),
            Tag::new("i-2", "env", "prod"),
        ]);

        let all = store.list_tags(&TagFilter::resource("i-1")).await.unwrap();
        let keys: Vec<_> = all.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["env", "zone"]);

        let exact = store
            .list_tags(&TagFilter::resource("i-1").with_key("env").with_value("prod"))
            .await
            .unwrap();
        assert_eq!(exact, vec![Tag::new("i-1", "env", "prod")]);

        let none = store
            .list_tags(&TagFilter::resource("i-1").with_key("env").with_value("dev"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
