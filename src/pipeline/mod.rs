//! Training pipeline abstractions
//!
//! This module provides:
//! - The per-invocation [`TrainingRun`] context with parallel rollouts
//! - A [`TrainingPipeline`] that drives a run to convergence or budget
//! - Observers recording progress, metrics and per-epoch JSONL

pub mod observers;
pub mod training;

// Re-export observer implementations (adapters)
pub use observers::{JsonlObserver, MetricsObserver, MetricsSummary, ProgressObserver};
pub use training::{
    EpochSummary, StopReason, TrainingConfig, TrainingOutcome, TrainingPipeline, TrainingRun,
    TrainingStats, TrainingSummary,
};

pub use crate::ports::Observer;
