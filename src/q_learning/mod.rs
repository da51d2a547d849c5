//! Tabular Q-learning
//!
//! The agent learns a [`PolicyTable`] of action scores for every pile size by
//! playing against the stochastic opponent in [`crate::environment`].
//!
//! ## Usage Example
//!
//! ```no_run
//! use stones::q_learning::{EpsilonSchedule, QLearningAgent, TdParams};
//!
//! let agent = QLearningAgent::new(
//!     TdParams {
//!         learning_rate: 0.5,
//!         discount_factor: 0.9,
//!     },
//!     EpsilonSchedule::Linear {
//!         start: 0.3,
//!         floor: 0.05,
//!         decay_episodes: 1000,
//!     },
//! );
//! assert_eq!(agent.table().rows().len(), 22);
//! ```

pub mod agent;
pub mod q_table;
pub mod serialization;

// Public re-exports
pub use agent::{EpsilonSchedule, QLearningAgent, select_action_epsilon_greedy};
pub use q_table::{PolicyTable, Row, TdParams};
pub use serialization::{SavedPolicy, TrainingMetadata};
