//! Stochastic training adversary
//!
//! The opponent plays the optimal move with probability `skill` and a
//! uniformly random legal move otherwise. Skill is resampled per episode from
//! a [`SkillRange`] so the agent sees imperfect play as well as perfect play.

use rand::{Rng, seq::IteratorRandom};
use serde::{Deserialize, Serialize};

use super::rules::{Action, GameState, optimal_take};
use crate::{Error, Result};

/// Range from which per-episode opponent skill is drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillRange {
    pub min: f64,
    pub max: f64,
}

impl SkillRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// Always the same skill
    pub fn fixed(skill: f64) -> Self {
        Self {
            min: skill,
            max: skill,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.min) || !in_unit(self.max) || self.min > self.max {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "skill range [{}, {}] must satisfy 0 <= min <= max <= 1",
                    self.min, self.max
                ),
            });
        }
        Ok(())
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.min == self.max {
            self.min
        } else {
            rng.random_range(self.min..=self.max)
        }
    }
}

impl Default for SkillRange {
    fn default() -> Self {
        Self {
            min: 0.25,
            max: 0.75,
        }
    }
}

/// Opponent policy: optimal with probability `skill`, random otherwise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpponentModel {
    pub skill: f64,
}

impl OpponentModel {
    pub fn new(skill: f64) -> Self {
        Self {
            skill: skill.clamp(0.0, 1.0),
        }
    }

    /// Choose a legal action for `state`; `None` once the pile is empty
    pub fn choose<R: Rng + ?Sized>(&self, state: GameState, rng: &mut R) -> Option<Action> {
        if state.is_terminal() {
            return None;
        }
        if rng.random_bool(self.skill) {
            optimal_take(state)
        } else {
            state.legal_actions().choose(rng)
        }
    }
}
