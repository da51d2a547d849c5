//! Versioned on-disk format for trained policy tables.

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    q_learning::{agent::EpsilonSchedule, q_table::PolicyTable, q_table::TdParams},
};

/// How a saved table was produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// Episodes played before the table was exported
    pub episodes_trained: Option<usize>,
    /// Whether training stopped on the convergence criterion
    pub converged: Option<bool>,
    /// TD hyper-parameters
    pub params: Option<TdParams>,
    /// Exploration schedule
    pub schedule: Option<EpsilonSchedule>,
    /// Opponent skill range `(min, max)`
    pub skill_range: Option<(f64, f64)>,
    /// Random seed used (if any)
    pub seed: Option<u64>,
}

/// A policy table plus provenance, as written by the repositories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPolicy {
    pub version: u32,
    pub table: PolicyTable,
    pub metadata: TrainingMetadata,
}

impl SavedPolicy {
    pub const VERSION: u32 = 1;

    pub fn new(table: PolicyTable, metadata: TrainingMetadata) -> Self {
        Self {
            version: Self::VERSION,
            table,
            metadata,
        }
    }

    /// Check version and table invariants after loading
    pub fn validate(&self) -> Result<()> {
        if self.version != Self::VERSION {
            return Err(Error::SerializationContext {
                operation: "load policy".to_string(),
                message: format!(
                    "unsupported save format version {}, expected {}",
                    self.version,
                    Self::VERSION
                ),
            });
        }
        self.table.validate()
    }

    pub fn into_table(self) -> PolicyTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Action, GameState};

    #[test]
    fn test_msgpack_roundtrip_preserves_table() {
        let mut table = PolicyTable::new();
        table.set(GameState::at(5).unwrap(), Action::Take1, 0.9);
        let saved = SavedPolicy::new(
            table.clone(),
            TrainingMetadata {
                episodes_trained: Some(1200),
                seed: Some(7),
                ..TrainingMetadata::default()
            },
        );

        let bytes = rmp_serde::to_vec_named(&saved).unwrap();
        let loaded: SavedPolicy = rmp_serde::from_slice(&bytes).unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded.table, table);
        assert_eq!(loaded.metadata.episodes_trained, Some(1200));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut saved = SavedPolicy::new(PolicyTable::new(), TrainingMetadata::default());
        saved.version = 99;
        assert!(saved.validate().is_err());
    }
}
