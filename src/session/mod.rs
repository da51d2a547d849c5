//! Live play against the device
//!
//! A [`Session`] uploads the trained table, then runs games turn by turn,
//! mirroring every move to the device and to an [`crate::ports::EventSink`].
//!
//! Phases: `AwaitingUpload -> Idle -> HumanTurn <-> AgentTurn -> GameOver
//! -> Idle`, and `Closed` from anywhere.

pub mod config;
pub mod coordinator;
pub mod state;

pub use config::SessionConfig;
pub use coordinator::Session;
pub use state::{Insights, SessionPhase, SessionState, WinTally};
