//! Twenty-one stones: train a tabular Q-learning policy and play it on a
//! small device over a line protocol
//!
//! This crate provides:
//! - The subtraction game rules and a skill-parameterised opponent
//! - A Q-learning trainer with parallel rollouts and convergence detection
//! - A line protocol codec with chunked table upload and resynchronisation
//! - A session coordinator that uploads the table and runs games
//! - Ports and adapters for channels, persistence, display and input

pub mod adapters;
pub mod cli;
pub mod environment;
pub mod error;
pub mod game;
pub mod pipeline;
pub mod ports;
pub mod protocol;
pub mod q_learning;
pub mod session;

pub use error::{Error, Result};
pub use game::{Action, Actor, GameState, OpponentModel, SkillRange};
pub use pipeline::{TrainingConfig, TrainingOutcome, TrainingPipeline};
pub use protocol::ProtocolMessage;
pub use q_learning::{PolicyTable, SavedPolicy};
pub use session::{Session, SessionConfig};
