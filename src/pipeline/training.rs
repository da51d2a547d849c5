//! Training pipeline for the tabular agent
//!
//! A [`TrainingRun`] owns everything that lives for one training invocation:
//! the agent, the environment instances and the accumulated statistics.
//! Each epoch plays one episode in every environment in parallel against a
//! read-only view of the table, then applies the returned traces one at a
//! time on the calling thread.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    environment::{EpisodeTrace, Environment},
    game::SkillRange,
    ports::Observer,
    q_learning::{EpsilonSchedule, PolicyTable, QLearningAgent, TdParams, TrainingMetadata},
};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// TD learning rate and discount
    pub params: TdParams,

    /// Exploration schedule
    pub schedule: EpsilonSchedule,

    /// Range from which each episode's opponent skill is drawn
    pub skill_range: SkillRange,

    /// Environments stepped in parallel per epoch
    pub batch_size: usize,

    /// Hard ceiling on episodes played
    pub episode_budget: usize,

    /// Largest table change per epoch considered negligible
    pub convergence_threshold: f64,

    /// Consecutive negligible epochs required to stop early
    pub patience: usize,

    /// Random seed
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            params: TdParams::default(),
            schedule: EpsilonSchedule::default(),
            skill_range: SkillRange::default(),
            batch_size: 16,
            episode_budget: 2000,
            convergence_threshold: 1e-4,
            patience: 10,
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_skill_range(mut self, skill_range: SkillRange) -> Self {
        self.skill_range = skill_range;
        self
    }

    pub fn with_episode_budget(mut self, episodes: usize) -> Self {
        self.episode_budget = episodes;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_schedule(mut self, schedule: EpsilonSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let TdParams {
            learning_rate,
            discount_factor,
        } = self.params;
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("learning rate {learning_rate} must lie in (0, 1]"),
            });
        }
        if !(0.0..=1.0).contains(&discount_factor) {
            return Err(Error::InvalidConfiguration {
                message: format!("discount factor {discount_factor} must lie in [0, 1]"),
            });
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfiguration {
                message: "batch size must be at least 1".to_string(),
            });
        }
        if !(self.convergence_threshold >= 0.0) {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "convergence threshold {} must be non-negative",
                    self.convergence_threshold
                ),
            });
        }
        self.schedule.validate()?;
        self.skill_range.validate()
    }

    /// Provenance recorded alongside an exported table
    pub fn metadata(&self, stats: &TrainingStats, converged: bool) -> TrainingMetadata {
        TrainingMetadata {
            episodes_trained: Some(stats.episodes_completed),
            converged: Some(converged),
            params: Some(self.params),
            schedule: Some(self.schedule),
            skill_range: Some((self.skill_range.min, self.skill_range.max)),
            seed: self.seed,
        }
    }
}

/// Counters accumulated over one training invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub episodes_completed: usize,
    pub epochs_completed: usize,
    /// Largest absolute table change in the most recent epoch
    pub last_max_delta: f64,
    /// Consecutive epochs with change below the threshold
    pub calm_epochs: usize,
    pub wins: usize,
}

impl TrainingStats {
    pub fn win_rate(&self) -> f64 {
        if self.episodes_completed == 0 {
            0.0
        } else {
            self.wins as f64 / self.episodes_completed as f64
        }
    }
}

/// Why training stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Table change stayed under the threshold for `patience` epochs
    Converged,
    /// Episode budget ran out first; the table is still exported
    BudgetExhausted,
}

/// Per-epoch report handed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub episodes: usize,
    pub episodes_completed: usize,
    pub max_delta: f64,
    pub epsilon: f64,
    pub wins: usize,
    pub mean_return: f64,
}

/// Final product of a training invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub table: PolicyTable,
    pub stats: TrainingStats,
    pub stop_reason: StopReason,
    pub metadata: TrainingMetadata,
}

impl TrainingOutcome {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }

    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            episodes: self.stats.episodes_completed,
            epochs: self.stats.epochs_completed,
            wins: self.stats.wins,
            win_rate: self.stats.win_rate(),
            last_max_delta: self.stats.last_max_delta,
            stop_reason: self.stop_reason,
            metadata: self.metadata.clone(),
        }
    }
}

/// JSON-friendly report of a run, without the table itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub epochs: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub last_max_delta: f64,
    pub stop_reason: StopReason,
    pub metadata: TrainingMetadata,
}

impl TrainingSummary {
    /// Save summary to JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load summary from JSON file
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let summary = serde_json::from_reader(file)?;
        Ok(summary)
    }
}

/// Derive an environment seed so seeded runs are reproducible
fn environment_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add((index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Context object for one training invocation
pub struct TrainingRun {
    config: TrainingConfig,
    agent: QLearningAgent,
    environments: Vec<Environment>,
    stats: TrainingStats,
}

impl TrainingRun {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        Self::from_table(config, PolicyTable::new())
    }

    /// Resume from an existing table
    pub fn from_table(config: TrainingConfig, table: PolicyTable) -> Result<Self> {
        config.validate()?;
        table.validate()?;

        let base_seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let environments = (0..config.batch_size)
            .map(|index| Environment::new(environment_seed(base_seed, index), config.skill_range))
            .collect();
        let agent = QLearningAgent::new(config.params, config.schedule).with_table(table);

        Ok(Self {
            config,
            agent,
            environments,
            stats: TrainingStats::default(),
        })
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    pub fn table(&self) -> &PolicyTable {
        self.agent.table()
    }

    pub fn is_converged(&self) -> bool {
        self.config.patience > 0 && self.stats.calm_epochs >= self.config.patience
    }

    pub fn budget_exhausted(&self) -> bool {
        self.stats.episodes_completed >= self.config.episode_budget
    }

    /// Play and learn from one epoch; `None` once the budget is spent
    pub fn step_epoch(&mut self) -> Result<Option<EpochSummary>> {
        let remaining = self
            .config
            .episode_budget
            .saturating_sub(self.stats.episodes_completed);
        if remaining == 0 {
            return Ok(None);
        }

        let batch = remaining.min(self.environments.len());
        let first_episode = self.stats.episodes_completed;
        let traces = self.rollout(batch, first_episode)?;

        let max_delta = self.agent.learn_batch(&traces);
        let mut wins = 0;
        let mut total_return = 0.0;
        for trace in &traces {
            wins += usize::from(trace.agent_won());
            total_return += trace.episode_return();
        }

        self.stats.episodes_completed += batch;
        self.stats.epochs_completed += 1;
        self.stats.last_max_delta = max_delta;
        self.stats.wins += wins;
        if max_delta < self.config.convergence_threshold {
            self.stats.calm_epochs += 1;
        } else {
            self.stats.calm_epochs = 0;
        }

        Ok(Some(EpochSummary {
            epoch: self.stats.epochs_completed,
            episodes: batch,
            episodes_completed: self.stats.episodes_completed,
            max_delta,
            epsilon: self.agent.epsilon(first_episode),
            wins,
            mean_return: total_return / batch as f64,
        }))
    }

    /// Play `batch` episodes in parallel against the current table
    fn rollout(&mut self, batch: usize, first_episode: usize) -> Result<Vec<EpisodeTrace>> {
        let agent = &self.agent;
        self.environments[..batch]
            .par_iter_mut()
            .enumerate()
            .map(|(offset, env)| {
                let episode = first_episode + offset;
                env.run_episode(|state, rng| agent.select_action(state, episode, rng))
            })
            .collect()
    }

    /// Tear down the run and export the table snapshot
    pub fn finish(self) -> TrainingOutcome {
        let converged = self.is_converged();
        let stop_reason = if converged {
            StopReason::Converged
        } else {
            StopReason::BudgetExhausted
        };
        let metadata = self.config.metadata(&self.stats, converged);
        TrainingOutcome {
            table: self.agent.into_table(),
            stats: self.stats,
            stop_reason,
            metadata,
        }
    }
}

/// Training pipeline: runs epochs until convergence or budget, notifying
/// observers along the way
pub struct TrainingPipeline {
    config: TrainingConfig,
    observers: Vec<Box<dyn Observer>>,
}

impl TrainingPipeline {
    /// Create a new training pipeline
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    /// Add an observer to the pipeline
    pub fn with_observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train from an all-zero table
    pub fn run(&mut self) -> Result<TrainingOutcome> {
        self.run_from(PolicyTable::new())
    }

    /// Train starting from `table`
    pub fn run_from(&mut self, table: PolicyTable) -> Result<TrainingOutcome> {
        let mut run = TrainingRun::from_table(self.config.clone(), table)?;

        log::info!(
            "training: budget {} episodes, {} environments, alpha {}, gamma {}",
            self.config.episode_budget,
            self.config.batch_size,
            self.config.params.learning_rate,
            self.config.params.discount_factor
        );
        for observer in &mut self.observers {
            observer.on_training_start(self.config.episode_budget)?;
        }

        while let Some(summary) = run.step_epoch()? {
            log::debug!(
                "epoch {:>5} episodes {:>6} max delta {:.6} epsilon {:.3}",
                summary.epoch,
                summary.episodes_completed,
                summary.max_delta,
                summary.epsilon
            );
            for observer in &mut self.observers {
                observer.on_epoch_end(&summary)?;
            }
            if run.is_converged() {
                break;
            }
        }

        let outcome = run.finish();
        match outcome.stop_reason {
            StopReason::Converged => log::info!(
                "training converged after {} episodes ({} epochs)",
                outcome.stats.episodes_completed,
                outcome.stats.epochs_completed
            ),
            StopReason::BudgetExhausted => log::warn!(
                "episode budget of {} exhausted before convergence (last max delta {:.6})",
                self.config.episode_budget,
                outcome.stats.last_max_delta
            ),
        }

        for observer in &mut self.observers {
            observer.on_training_end(&outcome)?;
        }
        Ok(outcome)
    }
}
