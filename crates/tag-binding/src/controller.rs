//! Tag lifecycle controller.
//!
//! Per binding the lifecycle is:
//!
//! ```text
//! Absent --create--> Present --delete--> Absent
//!                    Present --read finds nothing--> Absent (drift)
//! ```
//!
//! Create and delete run under the resource id's [`MutationLocks`] entry so
//! two mutations on one resource never interleave. Reads take no lock.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::binding::TagBinding;
use crate::error::{Operation, TagError};
use crate::locks::MutationLocks;
use crate::state::TagRecord;
use crate::store::{StoreError, Tag, TagFilter, TagStore};

/// Controller settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Upper bound on a create/delete, lock wait included.
    pub mutation_timeout: Option<Duration>,
}

/// Whether a tag was seen on the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The exact triple exists remotely.
    Present,
    /// No matching tag; the binding must be recreated.
    Absent,
}

impl Presence {
    /// `true` for [`Presence::Present`].
    #[must_use]
    pub fn is_present(self) -> bool {
        self == Self::Present
    }
}

/// Outcome of the read that follows a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The confirming read saw the tag.
    Confirmed,
    /// The write succeeded but the tag was not (yet) visible.
    Pending,
}

/// Result of [`TagController::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// Record with the identity assigned.
    pub record: TagRecord,
    /// Whether the tag was visible right after the write.
    pub visibility: Visibility,
}

/// Manages tag bindings against a [`TagStore`].
#[derive(Debug)]
pub struct TagController<S> {
    store: S,
    locks: MutationLocks,
    config: ControllerConfig,
}

impl<S: TagStore> TagController<S> {
    /// Create a controller with default settings.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, ControllerConfig::default())
    }

    /// Create a controller with explicit settings.
    #[must_use]
    pub fn with_config(store: S, config: ControllerConfig) -> Self {
        Self {
            store,
            locks: MutationLocks::new(),
            config,
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The per-resource lock registry.
    #[must_use]
    pub fn locks(&self) -> &MutationLocks {
        &self.locks
    }

    /// Attach the tag, then read it back.
    ///
    /// The identity is assigned whenever the write succeeds. If the
    /// follow-up read misses the tag or fails, the result is
    /// [`Visibility::Pending`] rather than an error.
    ///
    /// # Errors
    /// Returns [`TagError::Remote`] if the store rejects the write, or
    /// [`TagError::Timeout`] if the deadline passes first. No identity is
    /// assigned in either case.
    pub async fn create(&self, binding: &TagBinding) -> Result<Created, TagError> {
        let tag = Tag::from(binding);
        debug!(resource_id = %tag.resource_id, key = %tag.key, "Create tag input");

        self.mutate(Operation::Create, binding, self.store.add_tag(&tag))
            .await?;

        let mut record = TagRecord::absent(binding.clone());
        record.mark_present(false);
        info!(
            resource_id = %binding.resource_id(),
            key = %binding.key(),
            id = %binding.id(),
            "Tag created"
        );

        let visibility = match self.read(binding).await {
            Ok(Presence::Present) => {
                record.confirmed = true;
                Visibility::Confirmed
            }
            Ok(Presence::Absent) => {
                warn!(
                    resource_id = %binding.resource_id(),
                    key = %binding.key(),
                    "Tag written but not yet visible"
                );
                Visibility::Pending
            }
            Err(e) => {
                warn!(
                    resource_id = %binding.resource_id(),
                    key = %binding.key(),
                    error = %e,
                    "Could not confirm created tag"
                );
                Visibility::Pending
            }
        };

        Ok(Created { record, visibility })
    }

    /// Look the exact triple up on the remote resource.
    ///
    /// # Errors
    /// Returns [`TagError::Remote`] if the store query fails. Finding no
    /// tag is not an error.
    pub async fn read(&self, binding: &TagBinding) -> Result<Presence, TagError> {
        let filter = TagFilter::from(binding);
        let tags = self
            .store
            .list_tags(&filter)
            .await
            .map_err(|e| remote_error(Operation::Read, binding, e))?;

        match tags.len() {
            0 => {
                debug!(
                    resource_id = %binding.resource_id(),
                    key = %binding.key(),
                    value = %binding.value(),
                    "No matching tag found"
                );
                Ok(Presence::Absent)
            }
            1 => Ok(Presence::Present),
            n => {
                warn!(
                    resource_id = %binding.resource_id(),
                    key = %binding.key(),
                    matches = n,
                    "Tag store returned duplicate matches"
                );
                Ok(Presence::Present)
            }
        }
    }

    /// Read the record's binding and reconcile the record with the result.
    ///
    /// On drift the identity is cleared so the host recreates the tag. A
    /// record without identity stays without one even if the tag is found.
    ///
    /// # Errors
    /// Returns [`TagError::Remote`] if the store query fails; the record is
    /// left unchanged.
    pub async fn refresh(&self, record: &mut TagRecord) -> Result<Presence, TagError> {
        let presence = self.read(&record.binding).await?;

        match presence {
            // Identity only comes from a successful create
            Presence::Present => {
                if record.is_present() && !record.confirmed {
                    record.mark_confirmed();
                }
            }
            Presence::Absent => {
                if record.is_present() {
                    warn!(
                        resource_id = %record.binding.resource_id(),
                        key = %record.binding.key(),
                        id = ?record.id,
                        "Tag missing remotely, dropping from state"
                    );
                }
                record.mark_absent();
            }
        }

        Ok(presence)
    }

    /// Remove the tag and clear the record's identity.
    ///
    /// # Errors
    /// Returns [`TagError::Remote`] or [`TagError::Timeout`]; the record
    /// keeps its identity so the delete can be retried.
    pub async fn delete(&self, record: &mut TagRecord) -> Result<(), TagError> {
        let binding = &record.binding;
        let tag = Tag::from(binding);

        self.mutate(Operation::Delete, binding, self.store.remove_tag(&tag))
            .await?;

        info!(
            resource_id = %binding.resource_id(),
            key = %binding.key(),
            "Tag removed"
        );
        record.mark_absent();
        Ok(())
    }

    /// Move a record to a different triple.
    ///
    /// Every field forces a new binding, so this deletes the old tag and
    /// creates the new one. Replacing with the same triple only refreshes.
    ///
    /// # Errors
    /// Propagates the failing step. If the delete fails the record is left
    /// as it was; if the create fails the record is absent.
    pub async fn replace(
        &self,
        record: &mut TagRecord,
        binding: TagBinding,
    ) -> Result<Visibility, TagError> {
        if record.binding == binding {
            if record.is_present() && self.refresh(record).await?.is_present() {
                return Ok(Visibility::Confirmed);
            }
        } else if record.is_present() {
            self.delete(record).await?;
        }

        *record = TagRecord::absent(binding);
        let created = self.create(&record.binding).await?;
        *record = created.record;
        Ok(created.visibility)
    }

    /// Run a mutation under the resource lock and the configured deadline.
    async fn mutate<F>(
        &self,
        operation: Operation,
        binding: &TagBinding,
        call: F,
    ) -> Result<(), TagError>
    where
        F: Future<Output = Result<(), StoreError>>,
    {
        let locked = self
            .locks
            .with_lock(binding.resource_id(), || call);

        let result = match self.config.mutation_timeout {
            Some(timeout) => tokio::time::timeout(timeout, locked).await.map_err(|_| {
                warn!(
                    operation = %operation,
                    resource_id = %binding.resource_id(),
                    key = %binding.key(),
                    ?timeout,
                    "Tag mutation timed out"
                );
                TagError::Timeout {
                    operation,
                    resource_id: binding.resource_id().to_string(),
                    key: binding.key().to_string(),
                    timeout,
                }
            })?,
            None => locked.await,
        };

        result.map_err(|e| remote_error(operation, binding, e))
    }
}

fn remote_error(operation: Operation, binding: &TagBinding, source: StoreError) -> TagError {
    TagError::Remote {
        operation,
        resource_id: binding.resource_id().to_string(),
        key: binding.key().to_string(),
        value: binding.value().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTagStore;

    fn binding(key: &str, value: &str) -> TagBinding {
        TagBinding::new("i-12345", key, value).unwrap()
    }

    #[tokio::test]
    async fn test_create_confirms_visible_tag() {
        let controller = TagController::new(MemoryTagStore::new());
        let created = controller.create(&binding("env", "prod")).await.unwrap();

        assert_eq!(created.visibility, Visibility::Confirmed);
        assert!(created.record.is_present());
        assert!(created.record.confirmed);
        assert_eq!(controller.store().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_marks_pending_record_confirmed() {
        let controller = TagController::new(MemoryTagStore::new());
        let b = binding("env", "prod");
        controller.create(&b).await.unwrap();

        let mut record = TagRecord::absent(b);
        record.mark_present(false);
        let presence = controller.refresh(&mut record).await.unwrap();

        assert_eq!(presence, Presence::Present);
        assert!(record.confirmed);
    }

    #[tokio::test]
    async fn test_refresh_does_not_assign_identity() {
        let store = MemoryTagStore::new();
        store.add_tag(&Tag::new("i-1", "env", "prod")).await.unwrap();
        let controller = TagController::new(store);

        let mut record = TagRecord::absent(TagBinding::new("i-1", "env", "prod").unwrap());
        let presence = controller.refresh(&mut record).await.unwrap();

        assert_eq!(presence, Presence::Present);
        assert_eq!(record.id, None);
        assert!(!record.confirmed);
    }

    #[tokio::test]
    async fn test_replace_same_triple_creates_untracked_record() {
        let controller = TagController::new(MemoryTagStore::new());
        let b = binding("env", "prod");
        controller.create(&b).await.unwrap();

        let mut record = TagRecord::absent(b.clone());
        let visibility = controller.replace(&mut record, b.clone()).await.unwrap();

        assert_eq!(visibility, Visibility::Confirmed);
        assert_eq!(record.id, Some(b.id()));
    }

    #[tokio::test]
    async fn test_replace_moves_tag() {
        let controller = TagController::new(MemoryTagStore::new());
        let mut record = controller.create(&binding("env", "dev")).await.unwrap().record;

        let visibility = controller
            .replace(&mut record, binding("env", "prod"))
            .await
            .unwrap();

        assert_eq!(visibility, Visibility::Confirmed);
        assert_eq!(record.binding.value(), "prod");
        assert_eq!(
            controller.store().tags_on("i-12345"),
            vec![Tag::new("i-12345", "env", "prod")]
        );
    }

    #[tokio::test]
    async fn test_replace_same_triple_recreates_after_drift() {
        let controller = TagController::new(MemoryTagStore::new());
        let b = binding("env", "prod");
        let mut record = controller.create(&b).await.unwrap().record;
        controller.store().remove_key("i-12345", "env");

        let visibility = controller.replace(&mut record, b).await.unwrap();

        assert_eq!(visibility, Visibility::Confirmed);
        assert!(record.is_present());
        assert_eq!(controller.store().len(), 1);
    }

    #[tokio::test]
    async fn test_mutation_locks_released_after_create() {
        let controller = TagController::new(MemoryTagStore::new());
        controller.create(&binding("env", "prod")).await.unwrap();
        assert_eq!(controller.locks().active(), 0);
    }
}
