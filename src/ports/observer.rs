//! Observer port - abstraction for training observation and data collection
//!
//! This port defines the interface for observing training events,
//! allowing composable data collection without coupling training
//! logic to specific output formats or metrics.

use crate::{
    Result,
    pipeline::{EpochSummary, TrainingOutcome},
};

/// Observer trait for monitoring training
///
/// Observers can be composed to collect different types of data during training.
/// Examples include:
/// - Progress bars for user feedback
/// - JSONL export for analysis
/// - Metrics tracking for evaluation
///
/// # Event Sequence
///
/// The observer methods are called in the following order:
/// 1. `on_training_start(episode_budget)` - Once at the beginning
/// 2. `on_epoch_end(summary)` - After each batch of parallel episodes has
///    been applied to the table
/// 3. `on_training_end(outcome)` - Once at the end, convergence or not
pub trait Observer: Send {
    /// Called once before the first epoch.
    fn on_training_start(&mut self, _episode_budget: usize) -> Result<()> {
        Ok(())
    }

    /// Called after each epoch's updates have been applied.
    fn on_epoch_end(&mut self, _summary: &EpochSummary) -> Result<()> {
        Ok(())
    }

    /// Called once with the final outcome.
    fn on_training_end(&mut self, _outcome: &TrainingOutcome) -> Result<()> {
        Ok(())
    }
}
