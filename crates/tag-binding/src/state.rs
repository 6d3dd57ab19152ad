//! Host-side record of a managed tag.
//!
//! A [`TagRecord`] is the `(resource_id, key, value, identity)` tuple the
//! host keeps between runs. The controller updates it; the helpers here
//! persist it as JSON, one file per binding.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::binding::TagBinding;
use crate::identity::TagId;

/// Persisted state of one tag binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// The managed triple.
    #[serde(flatten)]
    pub binding: TagBinding,
    /// Identity, present while the tag is believed to exist.
    pub id: Option<TagId>,
    /// Whether a read has seen the tag since it was last written.
    #[serde(default)]
    pub confirmed: bool,
    /// Last time the record changed.
    pub updated_at: DateTime<Utc>,
}

impl TagRecord {
    /// A record for a binding that does not exist yet.
    #[must_use]
    pub fn absent(binding: TagBinding) -> Self {
        Self {
            binding,
            id: None,
            confirmed: false,
            updated_at: Utc::now(),
        }
    }

    /// Whether the binding is considered present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.id.is_some()
    }

    /// Assign the binding's identity.
    pub fn mark_present(&mut self, confirmed: bool) {
        self.id = Some(self.binding.id());
        self.confirmed = confirmed;
        self.updated_at = Utc::now();
    }

    /// Record that a read has seen the tag. Keeps the identity as is.
    pub fn mark_confirmed(&mut self) {
        self.confirmed = true;
        self.updated_at = Utc::now();
    }

    /// Drop the identity; the host should recreate the tag.
    pub fn mark_absent(&mut self) {
        self.id = None;
        self.confirmed = false;
        self.updated_at = Utc::now();
    }

    /// Path of the state file for `binding` inside `dir`.
    #[must_use]
    pub fn state_file(dir: &Path, binding: &TagBinding) -> PathBuf {
        dir.join(format!("{}.json", binding.id()))
    }

    /// Load the record for `binding`, if one was saved.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(dir: &Path, binding: &TagBinding) -> Result<Option<Self>> {
        let path = Self::state_file(dir, binding);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        let record: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))?;

        if record.binding != *binding {
            anyhow::bail!(
                "State file {} belongs to {}, not {}",
                path.display(),
                record.binding,
                binding
            );
        }

        debug!(path = %path.display(), present = record.is_present(), "Loaded tag record");
        Ok(Some(record))
    }

    /// Save the record, or remove its file once the binding is absent.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written or removed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::state_file(dir, &self.binding);

        if !self.is_present() {
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove state file {}", path.display()))?;
                info!(path = %path.display(), "Removed tag record");
            }
            return Ok(());
        }

        std::fs::create_dir_all(dir).context("Failed to create state directory")?;
        let content = serde_json::to_string_pretty(self).context("Failed to serialize record")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write state file {}", path.display()))?;

        debug!(path = %path.display(), "Saved tag record");
        Ok(())
    }
}
