//! Train command - Learn a policy table against the simulated opponent

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    cli::{
        StonesConfig,
        commands::repository_for,
        output::{format_number, format_percent, print_kv, print_section},
    },
    game::SkillRange,
    pipeline::{JsonlObserver, ProgressObserver, StopReason, TrainingConfig, TrainingPipeline},
    q_learning::{EpsilonSchedule, SavedPolicy, TdParams},
};

#[derive(Parser, Debug)]
#[command(about = "Train a policy table")]
pub struct TrainArgs {
    /// JSON configuration file; flags below override it
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Maximum number of training episodes
    #[arg(long, short = 'e')]
    pub episodes: Option<usize>,

    /// Episodes simulated in parallel per epoch
    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,

    /// Learning rate (alpha)
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Discount factor (gamma)
    #[arg(long)]
    pub discount: Option<f64>,

    /// Initial exploration rate
    #[arg(long)]
    pub epsilon_start: Option<f64>,

    /// Final exploration rate
    #[arg(long)]
    pub epsilon_floor: Option<f64>,

    /// Share of the episode budget over which exploration decays linearly
    #[arg(long)]
    pub exploration_fraction: Option<f64>,

    /// Lowest opponent skill
    #[arg(long)]
    pub skill_min: Option<f64>,

    /// Highest opponent skill
    #[arg(long)]
    pub skill_max: Option<f64>,

    /// Largest table change per epoch still counted as converged
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Consecutive converged epochs required to stop
    #[arg(long)]
    pub patience: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output file for the trained table (`.json` or MessagePack)
    #[arg(long, short = 'o', default_value = "q_table.msgpack")]
    pub output: PathBuf,

    /// Also write the table as text, 3 decimals per row
    #[arg(long)]
    pub text: Option<PathBuf>,

    /// Optional path for writing a summary JSON file
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Optional file for JSONL per-epoch observations
    #[arg(long)]
    pub observations: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,
}

impl TrainArgs {
    /// Configuration file values with command-line overrides applied
    pub fn training_config(&self) -> Result<TrainingConfig> {
        let file = StonesConfig::load_or_default(self.config.as_deref())
            .context("Failed to load configuration")?;
        let mut config = file.training;

        if let Some(episodes) = self.episodes {
            config.episode_budget = episodes;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        let TdParams {
            learning_rate,
            discount_factor,
        } = config.params;
        config.params = TdParams {
            learning_rate: self.learning_rate.unwrap_or(learning_rate),
            discount_factor: self.discount.unwrap_or(discount_factor),
        };
        if self.epsilon_start.is_some()
            || self.epsilon_floor.is_some()
            || self.exploration_fraction.is_some()
        {
            let (start, floor) = match config.schedule {
                EpsilonSchedule::Linear { start, floor, .. }
                | EpsilonSchedule::Exponential { start, floor, .. } => (start, floor),
            };
            config.schedule = EpsilonSchedule::linear_over(
                self.epsilon_start.unwrap_or(start),
                self.epsilon_floor.unwrap_or(floor),
                config.episode_budget,
                self.exploration_fraction.unwrap_or(0.5),
            );
        }
        if self.skill_min.is_some() || self.skill_max.is_some() {
            config.skill_range = SkillRange::new(
                self.skill_min.unwrap_or(config.skill_range.min),
                self.skill_max.unwrap_or(config.skill_range.max),
            )?;
        }
        if let Some(threshold) = self.threshold {
            config.convergence_threshold = threshold;
        }
        if let Some(patience) = self.patience {
            config.patience = patience;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn execute(args: TrainArgs) -> Result<()> {
    let config = args.training_config()?;

    print_section("Training Configuration");
    print_kv("Episode budget", &format_number(config.episode_budget));
    print_kv("Batch size", &config.batch_size.to_string());
    print_kv(
        "Alpha / gamma",
        &format!(
            "{} / {}",
            config.params.learning_rate, config.params.discount_factor
        ),
    );
    print_kv(
        "Opponent skill",
        &format!("{:.2}..{:.2}", config.skill_range.min, config.skill_range.max),
    );
    print_kv(
        "Seed",
        &config
            .seed
            .map_or_else(|| "random".to_string(), |seed| seed.to_string()),
    );

    let mut pipeline = TrainingPipeline::new(config);
    if !args.quiet {
        pipeline = pipeline.with_observer(Box::new(ProgressObserver::new()));
    }
    if let Some(path) = &args.observations {
        let observer = JsonlObserver::new(path)
            .with_context(|| format!("Failed to create observations file {}", path.display()))?;
        pipeline = pipeline.with_observer(Box::new(observer));
    }

    let outcome = pipeline.run().context("Training failed")?;

    print_section("Training Complete");
    print_kv(
        "Stopped",
        match outcome.stop_reason {
            StopReason::Converged => "converged",
            StopReason::BudgetExhausted => "episode budget exhausted",
        },
    );
    print_kv("Episodes", &format_number(outcome.stats.episodes_completed));
    print_kv("Epochs", &format_number(outcome.stats.epochs_completed));
    print_kv("Win rate", &format_percent(outcome.stats.win_rate()));
    print_kv("Last max change", &format!("{:.6}", outcome.stats.last_max_delta));

    let summary = outcome.summary();
    let policy = SavedPolicy::new(outcome.table, outcome.metadata);
    repository_for(&args.output)
        .save(&policy, &args.output)
        .with_context(|| format!("Failed to save table to {}", args.output.display()))?;
    println!("\n✓ Table saved to: {}", args.output.display());

    if let Some(path) = &args.text {
        fs::write(path, policy.table.to_text())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ Text table written to: {}", path.display());
    }
    if let Some(path) = &args.summary {
        summary
            .save(path)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
        println!("✓ Summary written to: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> TrainArgs {
        let mut argv = vec!["train"];
        argv.extend_from_slice(args);
        TrainArgs::parse_from(argv)
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = parse(&[
            "--episodes",
            "400",
            "--seed",
            "9",
            "--skill-min",
            "1.0",
            "--skill-max",
            "1.0",
            "--epsilon-start",
            "0.5",
        ]);
        let config = args.training_config().unwrap();
        assert_eq!(config.episode_budget, 400);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.skill_range, SkillRange::fixed(1.0));
        assert_eq!(config.schedule.epsilon(0), 0.5);
    }

    #[test]
    fn test_invalid_flag_values_fail() {
        let args = parse(&["--learning-rate", "0"]);
        assert!(args.training_config().is_err());
    }
}
