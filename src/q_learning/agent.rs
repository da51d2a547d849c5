//! Epsilon-greedy Q-learning agent
//!
//! The agent itself holds no random state: exploration draws from the RNG
//! of the environment instance it is acting in, which keeps parallel
//! rollouts independent and reproducible.

use rand::{Rng, seq::IteratorRandom};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    environment::EpisodeTrace,
    game::{Action, GameState},
    q_learning::q_table::{PolicyTable, TdParams},
};

/// Exploration rate as a function of completed episodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// Straight line from `start` to `floor` over `decay_episodes`
    Linear {
        start: f64,
        floor: f64,
        decay_episodes: usize,
    },
    /// Multiply by `decay` after every episode, never below `floor`
    Exponential { start: f64, floor: f64, decay: f64 },
}

impl EpsilonSchedule {
    /// Linear decay spanning `fraction` of an episode budget
    pub fn linear_over(start: f64, floor: f64, budget: usize, fraction: f64) -> Self {
        EpsilonSchedule::Linear {
            start,
            floor,
            decay_episodes: ((budget as f64) * fraction).round().max(1.0) as usize,
        }
    }

    pub fn epsilon(&self, episode: usize) -> f64 {
        match *self {
            EpsilonSchedule::Linear {
                start,
                floor,
                decay_episodes,
            } => {
                if decay_episodes == 0 {
                    return floor;
                }
                let slope = (floor - start) / decay_episodes as f64;
                (start + slope * episode as f64).max(floor)
            }
            EpsilonSchedule::Exponential { start, floor, decay } => {
                let exponent = i32::try_from(episode).unwrap_or(i32::MAX);
                (start * decay.powi(exponent)).max(floor)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (start, floor) = match *self {
            EpsilonSchedule::Linear { start, floor, .. } => (start, floor),
            EpsilonSchedule::Exponential { start, floor, decay } => {
                if !(0.0..=1.0).contains(&decay) {
                    return Err(Error::InvalidConfiguration {
                        message: format!("epsilon decay {decay} must lie in [0, 1]"),
                    });
                }
                (start, floor)
            }
        };
        if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&floor) || floor > start {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "epsilon schedule needs 0 <= floor ({floor}) <= start ({start}) <= 1"
                ),
            });
        }
        Ok(())
    }
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        EpsilonSchedule::Linear {
            start: 0.3,
            floor: 0.05,
            decay_episodes: 1000,
        }
    }
}

/// ε-greedy action selection over legal actions
pub fn select_action_epsilon_greedy<R: Rng + ?Sized>(
    table: &PolicyTable,
    state: GameState,
    epsilon: f64,
    rng: &mut R,
) -> Option<Action> {
    if rng.random::<f64>() < epsilon {
        // Explore: random legal action
        state.legal_actions().choose(rng)
    } else {
        // Exploit: greedy action based on Q-values
        table.greedy_action(state)
    }
}

/// Q-learning agent (off-policy TD control)
///
/// Learns the optimal Q* function by always updating toward the maximum
/// next-state value, regardless of the action actually taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QLearningAgent {
    table: PolicyTable,
    params: TdParams,
    schedule: EpsilonSchedule,
}

impl QLearningAgent {
    pub fn new(params: TdParams, schedule: EpsilonSchedule) -> Self {
        Self {
            table: PolicyTable::new(),
            params,
            schedule,
        }
    }

    /// Continue training from an existing table
    pub fn with_table(mut self, table: PolicyTable) -> Self {
        self.table = table;
        self
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn into_table(self) -> PolicyTable {
        self.table
    }

    pub fn params(&self) -> TdParams {
        self.params
    }

    pub fn epsilon(&self, episode: usize) -> f64 {
        self.schedule.epsilon(episode)
    }

    /// Exploring action for training at global episode index `episode`
    pub fn select_action<R: Rng + ?Sized>(
        &self,
        state: GameState,
        episode: usize,
        rng: &mut R,
    ) -> Option<Action> {
        select_action_epsilon_greedy(&self.table, state, self.epsilon(episode), rng)
    }

    /// Replay one episode's transitions in order; returns the largest change
    pub fn learn(&mut self, trace: &EpisodeTrace) -> f64 {
        trace
            .transitions
            .iter()
            .map(|t| {
                self.table.q_learning_update(
                    t.state,
                    t.action,
                    t.reward,
                    t.next_state,
                    t.done,
                    self.params,
                )
            })
            .fold(0.0, f64::max)
    }

    /// Replay a batch of episodes in order; returns the largest net change
    /// to any entry over the whole batch
    pub fn learn_batch(&mut self, traces: &[EpisodeTrace]) -> f64 {
        let before = self.table.clone();
        for trace in traces {
            self.learn(trace);
        }
        self.table.max_abs_diff(&before)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::environment::Transition;

    #[test]
    fn test_linear_schedule_reaches_floor() {
        let schedule = EpsilonSchedule::Linear {
            start: 0.3,
            floor: 0.05,
            decay_episodes: 100,
        };
        assert!((schedule.epsilon(0) - 0.3).abs() < 1e-12);
        assert!((schedule.epsilon(50) - 0.175).abs() < 1e-12);
        assert!((schedule.epsilon(100) - 0.05).abs() < 1e-12);
        assert!((schedule.epsilon(5000) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_exponential_schedule_decays_multiplicatively() {
        let schedule = EpsilonSchedule::Exponential {
            start: 0.5,
            floor: 0.01,
            decay: 0.5,
        };
        assert!((schedule.epsilon(2) - 0.125).abs() < 1e-12);
        assert!((schedule.epsilon(100) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_linear_over_fraction_of_budget() {
        let schedule = EpsilonSchedule::linear_over(1.0, 0.05, 1000, 0.8);
        assert_eq!(
            schedule,
            EpsilonSchedule::Linear {
                start: 1.0,
                floor: 0.05,
                decay_episodes: 800
            }
        );
    }

    #[test]
    fn test_schedule_validation() {
        assert!(EpsilonSchedule::default().validate().is_ok());
        let inverted = EpsilonSchedule::Linear {
            start: 0.05,
            floor: 0.3,
            decay_episodes: 10,
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_zero_epsilon_is_greedy() {
        let mut table = PolicyTable::new();
        let state = GameState::at(10).unwrap();
        table.set(state, Action::Take2, 1.0);
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..50 {
            assert_eq!(
                select_action_epsilon_greedy(&table, state, 0.0, &mut rng),
                Some(Action::Take2)
            );
        }
    }

    #[test]
    fn test_full_exploration_stays_legal() {
        let table = PolicyTable::new();
        let state = GameState::at(2).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..100 {
            let action = select_action_epsilon_greedy(&table, state, 1.0, &mut rng).unwrap();
            assert!(action.is_legal(state));
        }
    }

    #[test]
    fn test_learn_applies_transitions_in_order() {
        let mut agent = QLearningAgent::new(TdParams::default(), EpsilonSchedule::default());
        let s = |n| GameState::at(n).unwrap();
        let trace = EpisodeTrace {
            transitions: vec![
                Transition {
                    state: s(5),
                    action: Action::Take1,
                    reward: 0.0,
                    next_state: s(1),
                    done: false,
                },
                Transition {
                    state: s(1),
                    action: Action::Take1,
                    reward: 1.0,
                    next_state: s(0),
                    done: true,
                },
            ],
            skill: 1.0,
        };

        let delta = agent.learn(&trace);
        // First update sees Q(1, Take1) = 0, second sets it to 0.5.
        assert_eq!(agent.table().get(s(5), Action::Take1), 0.0);
        assert!((agent.table().get(s(1), Action::Take1) - 0.5).abs() < 1e-12);
        assert!((delta - 0.5).abs() < 1e-12);

        agent.learn(&trace);
        // 0.5 * (0.9 * 0.5) = 0.225
        assert!((agent.table().get(s(5), Action::Take1) - 0.225).abs() < 1e-12);
    }

    #[test]
    fn test_batch_change_is_net_per_entry() {
        let mut agent = QLearningAgent::new(TdParams::default(), EpsilonSchedule::default());
        let s = |n| GameState::at(n).unwrap();
        let win = EpisodeTrace {
            transitions: vec![Transition {
                state: s(1),
                action: Action::Take1,
                reward: 1.0,
                next_state: s(0),
                done: true,
            }],
            skill: 1.0,
        };

        // 0 -> 0.5 -> 0.75: each update moves less than the entry as a whole
        let delta = agent.learn_batch(&[win.clone(), win]);
        assert!((agent.table().get(s(1), Action::Take1) - 0.75).abs() < 1e-12);
        assert!((delta - 0.75).abs() < 1e-12);
        assert_eq!(agent.learn_batch(&[]), 0.0);
    }
}
