//! Saved policies as MessagePack files
//!
//! Fields are written by name; the exploration schedule is an internally
//! tagged enum and cannot be read back from the positional encoding.

use std::{fs::File, path::Path};

use crate::{Result, error::Error, ports::PolicyRepository, q_learning::SavedPolicy};

/// MessagePack-based policy repository.
///
/// # Examples
///
/// ```no_run
/// use stones::adapters::MsgPackRepository;
/// use stones::ports::PolicyRepository;
/// use std::path::Path;
///
/// let repo = MsgPackRepository::new();
/// let policy = repo.load(Path::new("trained.msgpack"))?;
/// println!("{}", policy.table.to_text());
/// # Ok::<(), stones::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackRepository;

impl MsgPackRepository {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyRepository for MsgPackRepository {
    fn save(&self, policy: &SavedPolicy, path: &Path) -> Result<()> {
        let mut file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create file {path:?}"),
            source,
        })?;

        rmp_serde::encode::write_named(&mut file, policy).map_err(|e| {
            Error::SerializationContext {
                operation: "serialize policy to MessagePack".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(())
    }

    fn load(&self, path: &Path) -> Result<SavedPolicy> {
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open file {path:?}"),
            source,
        })?;

        let policy: SavedPolicy =
            rmp_serde::decode::from_read(&file).map_err(|e| Error::SerializationContext {
                operation: "deserialize policy from MessagePack".to_string(),
                message: e.to_string(),
            })?;

        policy.validate()?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::q_learning::{PolicyTable, TrainingMetadata};

    #[test]
    fn test_msgpack_roundtrip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("policy.msgpack");

        let repo = MsgPackRepository::new();
        let metadata = TrainingMetadata {
            episodes_trained: Some(1200),
            converged: Some(true),
            ..TrainingMetadata::default()
        };
        let policy = SavedPolicy::new(PolicyTable::heuristic(), metadata);

        repo.save(&policy, &file_path).expect("Failed to save");
        let loaded = repo.load(&file_path).expect("Failed to load");

        assert_eq!(loaded, policy);
    }

    #[test]
    fn test_load_nonexistent_returns_error() {
        let repo = MsgPackRepository::new();
        let result = repo.load(Path::new("/tmp/nonexistent_stones_12345.msgpack"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_load_garbage_returns_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("garbage.msgpack");
        std::fs::write(&file_path, b"not a policy").unwrap();

        let result = MsgPackRepository::new().load(&file_path);
        assert!(matches!(result, Err(Error::SerializationContext { .. })));
    }
}
