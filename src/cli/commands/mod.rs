//! Subcommands of the `stones` binary

use std::path::Path;

use crate::{
    Result,
    adapters::{JsonRepository, MsgPackRepository},
    ports::PolicyRepository,
    q_learning::SavedPolicy,
};

pub mod export;
pub mod inspect;
pub mod play;
pub mod train;

/// `.json` files are stored as JSON, everything else as MessagePack
pub fn repository_for(path: &Path) -> Box<dyn PolicyRepository> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Box::new(JsonRepository::new()),
        _ => Box::new(MsgPackRepository::new()),
    }
}

pub fn load_policy(path: &Path) -> Result<SavedPolicy> {
    repository_for(path).load(path)
}
