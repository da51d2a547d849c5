//! JSON implementation of the policy repository.
//!
//! Human-readable counterpart of [`super::MsgPackRepository`], handy for
//! diffing tables between runs.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use crate::{Result, error::Error, ports::PolicyRepository, q_learning::SavedPolicy};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRepository;

impl JsonRepository {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyRepository for JsonRepository {
    fn save(&self, policy: &SavedPolicy, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create file {path:?}"),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, policy)?;
        writer.flush()?;
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<SavedPolicy> {
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open file {path:?}"),
            source,
        })?;
        let policy: SavedPolicy = serde_json::from_reader(BufReader::new(file))?;
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
    fn test_json_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("policy.json");
        let policy = SavedPolicy::new(PolicyTable::heuristic(), TrainingMetadata::default());

        let repo = JsonRepository::new();
        repo.save(&policy, &file_path).unwrap();
        assert_eq!(repo.load(&file_path).unwrap(), policy);
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("policy.json");
        let mut policy = SavedPolicy::new(PolicyTable::new(), TrainingMetadata::default());
        policy.version = 99;

        let repo = JsonRepository::new();
        repo.save(&policy, &file_path).unwrap();
        assert!(matches!(
            repo.load(&file_path),
            Err(Error::SerializationContext { .. })
        ));
    }
}
