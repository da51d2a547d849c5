//! Configuration file shared by CLI commands

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, pipeline::TrainingConfig, session::SessionConfig};

/// Contents of the `--config` JSON file. Missing sections and fields take
/// their defaults; command-line flags override both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StonesConfig {
    pub training: TrainingConfig,
    pub session: SessionConfig,
}

impl StonesConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open config {path:?}"),
            source,
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.session.validate()
    }
}
