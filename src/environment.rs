//! Episodic simulation of the agent against the opponent model
//!
//! Each [`Environment`] owns its own random number generator, so any number
//! of instances can be stepped on different threads without coordination.
//! From the agent's point of view one [`Environment::step`] is a full round:
//! the agent moves, then (unless the game ended) the opponent replies.

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    game::{Action, Actor, GameState, OpponentModel, SkillRange, apply},
};

/// Outcome of one agent step, opponent reply included
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// State the agent faces next (empty pile when done)
    pub state: GameState,
    pub reward: f64,
    pub done: bool,
    /// Opponent's reply, if the game continued past the agent's move
    pub opponent_action: Option<Action>,
}

/// One `(s, a, r, s')` experience
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: GameState,
    pub action: Action,
    pub reward: f64,
    pub next_state: GameState,
    pub done: bool,
}

/// Ordered transitions of one game, consumed by the update step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeTrace {
    pub transitions: Vec<Transition>,
    /// Opponent skill used for this episode
    pub skill: f64,
}

impl EpisodeTrace {
    /// Total reward collected by the agent
    pub fn episode_return(&self) -> f64 {
        self.transitions.iter().map(|t| t.reward).sum()
    }

    pub fn agent_won(&self) -> bool {
        self.transitions
            .last()
            .is_some_and(|t| t.done && t.reward > 0.0)
    }
}

/// Resettable game against a stochastic opponent
#[derive(Debug, Clone)]
pub struct Environment {
    state: GameState,
    skill_range: SkillRange,
    opponent: OpponentModel,
    rng: StdRng,
}

impl Environment {
    pub fn new(seed: u64, skill_range: SkillRange) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let opponent = OpponentModel::new(skill_range.sample(&mut rng));
        Self {
            state: GameState::new(),
            skill_range,
            opponent,
            rng,
        }
    }

    /// Start a new game with the full pile and a freshly sampled skill
    pub fn reset(&mut self) -> GameState {
        self.state = GameState::new();
        self.opponent = OpponentModel::new(self.skill_range.sample(&mut self.rng));
        self.state
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn skill(&self) -> f64 {
        self.opponent.skill
    }

    /// Apply the agent's action and the opponent's reply
    pub fn step(&mut self, action: Action) -> Result<Step> {
        let agent = apply(self.state, action, Actor::Ai)?;
        if agent.done {
            self.state = agent.next_state;
            return Ok(Step {
                state: self.state,
                reward: agent.reward,
                done: true,
                opponent_action: None,
            });
        }

        let reply = self
            .opponent
            .choose(agent.next_state, &mut self.rng)
            .ok_or(crate::Error::GameOver)?;
        let opponent = apply(agent.next_state, reply, Actor::Human)?;
        self.state = opponent.next_state;

        Ok(Step {
            state: self.state,
            reward: opponent.reward,
            done: opponent.done,
            opponent_action: Some(reply),
        })
    }

    /// Play one full game, choosing agent actions with `policy`.
    ///
    /// The policy receives the current state and this instance's RNG and
    /// must return a legal action for any non-terminal state.
    pub fn run_episode<F>(&mut self, mut policy: F) -> Result<EpisodeTrace>
    where
        F: FnMut(GameState, &mut StdRng) -> Option<Action>,
    {
        let mut state = self.reset();
        let mut trace = EpisodeTrace {
            transitions: Vec::new(),
            skill: self.skill(),
        };

        while !state.is_terminal() {
            let action = policy(state, &mut self.rng).ok_or(crate::Error::GameOver)?;
            let step = self.step(action)?;
            trace.transitions.push(Transition {
                state,
                action,
                reward: step.reward,
                next_state: step.state,
                done: step.done,
            });
            state = step.state;
        }

        Ok(trace)
    }
}
