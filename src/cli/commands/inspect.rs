//! Inspect command - Show what a trained table would play

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    cli::{
        commands::load_policy,
        output::{format_number, print_kv, print_section},
    },
    game::{GameState, INITIAL_STONES, optimal_take},
    q_learning::SavedPolicy,
    session::Insights,
};

#[derive(Parser, Debug)]
#[command(about = "Show per-state scores and the greedy move")]
pub struct InspectArgs {
    /// Saved table (`.json` or MessagePack)
    pub table: PathBuf,
}

/// Insights for every non-terminal state, largest pile first
pub fn all_insights(policy: &SavedPolicy) -> Vec<Insights> {
    (1..=INITIAL_STONES)
        .rev()
        .filter_map(|stones| GameState::at(stones).ok())
        .map(|state| Insights::new(&policy.table, state))
        .collect()
}

/// States where the greedy move differs from the optimal take
pub fn disagreements(policy: &SavedPolicy) -> Vec<GameState> {
    all_insights(policy)
        .into_iter()
        // Multiples of four are lost whatever is played
        .filter(|insight| insight.state.stones() % 4 != 0)
        .filter(|insight| insight.best != optimal_take(insight.state))
        .map(|insight| insight.state)
        .collect()
}

pub fn execute(args: InspectArgs) -> Result<()> {
    let policy = load_policy(&args.table)
        .with_context(|| format!("Failed to load table from {}", args.table.display()))?;

    print_section("Table Info");
    print_kv("Format version", &policy.version.to_string());
    let metadata = &policy.metadata;
    if let Some(episodes) = metadata.episodes_trained {
        print_kv("Episodes trained", &format_number(episodes));
    }
    if let Some(converged) = metadata.converged {
        print_kv("Converged", if converged { "yes" } else { "no" });
    }
    if let Some((min, max)) = metadata.skill_range {
        print_kv("Opponent skill", &format!("{min:.2}..{max:.2}"));
    }
    if let Some(seed) = metadata.seed {
        print_kv("Seed", &seed.to_string());
    }

    print_section("AI Insights");
    for insight in all_insights(&policy) {
        println!("{insight}");
    }

    let wrong = disagreements(&policy);
    if wrong.is_empty() {
        println!("\n✓ Greedy play matches the optimal take in every winnable state");
    } else {
        let states: Vec<String> = wrong.iter().map(ToString::to_string).collect();
        println!("\n⚠ Greedy play is not optimal at: {}", states.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_learning::{PolicyTable, TrainingMetadata};

    #[test]
    fn test_heuristic_has_no_disagreements() {
        let policy = SavedPolicy::new(PolicyTable::heuristic(), TrainingMetadata::default());
        assert_eq!(all_insights(&policy).len(), 21);
        assert!(disagreements(&policy).is_empty());
    }

    #[test]
    fn test_zero_table_disagrees_where_take_one_is_wrong() {
        // All ties pick Take1
        let policy = SavedPolicy::new(PolicyTable::new(), TrainingMetadata::default());
        let wrong: Vec<u8> = disagreements(&policy).iter().map(|s| s.stones()).collect();
        assert!(wrong.contains(&2));
        assert!(wrong.contains(&3));
        assert!(!wrong.contains(&5));
    }
}
