//! Repository port for trained policy persistence.
//!
//! This module defines the trait boundary between the domain and infrastructure
//! layers for policy storage and retrieval.

use std::path::Path;

use crate::{Result, q_learning::SavedPolicy};

/// Port for persisting and loading trained policies.
///
/// # Examples
///
/// ```no_run
/// use stones::adapters::MsgPackRepository;
/// use stones::ports::PolicyRepository;
/// use stones::q_learning::{PolicyTable, SavedPolicy, TrainingMetadata};
/// use std::path::Path;
///
/// let repo = MsgPackRepository::new();
/// let policy = SavedPolicy::new(PolicyTable::heuristic(), TrainingMetadata::default());
/// repo.save(&policy, Path::new("policy.msgpack"))?;
/// let loaded = repo.load(Path::new("policy.msgpack"))?;
/// # Ok::<(), stones::Error>(())
/// ```
pub trait PolicyRepository {
    /// Save a policy to persistent storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be written or serialization fails.
    fn save(&self, policy: &SavedPolicy, path: &Path) -> Result<()>;

    /// Load a policy from persistent storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a policy, carries
    /// an unsupported version, or holds non-finite scores.
    fn load(&self, path: &Path) -> Result<SavedPolicy>;
}
