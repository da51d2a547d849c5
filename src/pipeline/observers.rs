//! Epoch observers: progress bar, in-memory metrics and JSONL export

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    pipeline::training::{EpochSummary, StopReason, TrainingOutcome},
    ports::Observer,
};

/// Episode progress bar with running win rate and last table change
pub struct ProgressObserver {
    progress_bar: Option<ProgressBar>,
    wins: usize,
    episodes: usize,
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self {
            progress_bar: None,
            wins: 0,
            episodes: 0,
        }
    }

    fn message(&self, delta: f64) -> String {
        let win_rate = if self.episodes == 0 {
            0.0
        } else {
            self.wins as f64 / self.episodes as f64
        };
        format!("W:{:.1}% Δ:{delta:.5}", 100.0 * win_rate)
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for ProgressObserver {
    fn on_training_start(&mut self, episode_budget: usize) -> Result<()> {
        let pb = ProgressBar::new(episode_budget as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} episodes ({msg})")
                .map_err(|e| crate::Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?
                .progress_chars("=>-"),
        );
        self.progress_bar = Some(pb);
        Ok(())
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary) -> Result<()> {
        self.wins += summary.wins;
        self.episodes += summary.episodes;
        if let Some(pb) = &self.progress_bar {
            pb.set_position(summary.episodes_completed as u64);
            pb.set_message(self.message(summary.max_delta));
        }
        Ok(())
    }

    fn on_training_end(&mut self, outcome: &TrainingOutcome) -> Result<()> {
        if let Some(pb) = &self.progress_bar {
            let status = match outcome.stop_reason {
                StopReason::Converged => "converged",
                StopReason::BudgetExhausted => "budget exhausted",
            };
            pb.finish_with_message(format!(
                "{} {status}",
                self.message(outcome.stats.last_max_delta)
            ));
        }
        Ok(())
    }
}

/// Keeps per-epoch deltas and returns for later inspection
pub struct MetricsObserver {
    epochs: usize,
    episodes: usize,
    wins: usize,
    deltas: Vec<f64>,
    returns: Vec<f64>,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self {
            epochs: 0,
            episodes: 0,
            wins: 0,
            deltas: Vec::new(),
            returns: Vec::new(),
        }
    }

    /// Agent wins over all observed episodes
    pub fn win_rate(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.wins as f64 / self.episodes as f64
        }
    }

    /// Max table change recorded for each epoch, in order
    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    /// Mean return over the most recent `window` epochs
    pub fn recent_mean_return(&self, window: usize) -> f64 {
        let start = self.returns.len().saturating_sub(window);
        let recent = &self.returns[start..];
        if recent.is_empty() {
            0.0
        } else {
            recent.iter().sum::<f64>() / recent.len() as f64
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            epochs: self.epochs,
            episodes: self.episodes,
            wins: self.wins,
            win_rate: self.win_rate(),
            final_delta: self.deltas.last().copied().unwrap_or(0.0),
        }
    }
}

/// Totals over every observed epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub epochs: usize,
    pub episodes: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub final_delta: f64,
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for MetricsObserver {
    fn on_epoch_end(&mut self, summary: &EpochSummary) -> Result<()> {
        self.epochs += 1;
        self.episodes += summary.episodes;
        self.wins += summary.wins;
        self.deltas.push(summary.max_delta);
        self.returns.push(summary.mean_return);
        Ok(())
    }
}

/// Writes each [`EpochSummary`] as one JSON line
pub struct JsonlObserver {
    writer: BufWriter<File>,
}

impl JsonlObserver {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }
}

impl Observer for JsonlObserver {
    fn on_epoch_end(&mut self, summary: &EpochSummary) -> Result<()> {
        serde_json::to_writer(&mut self.writer, summary)?;
        writeln!(&mut self.writer)?;
        Ok(())
    }

    fn on_training_end(&mut self, _outcome: &TrainingOutcome) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
