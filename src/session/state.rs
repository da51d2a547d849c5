//! Session phases, win tally and per-state insights

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    game::{Action, Actor, GameState},
    q_learning::PolicyTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Table not yet acknowledged by the device
    AwaitingUpload,
    /// Between games
    Idle,
    HumanTurn,
    AgentTurn,
    /// Final move applied, result not yet reported
    GameOver,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::AwaitingUpload => "AwaitingUpload",
            SessionPhase::Idle => "Idle",
            SessionPhase::HumanTurn => "HumanTurn",
            SessionPhase::AgentTurn => "AgentTurn",
            SessionPhase::GameOver => "GameOver",
            SessionPhase::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Games won by each side during one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinTally {
    pub human: u32,
    pub ai: u32,
}

impl WinTally {
    pub fn record(&mut self, winner: Actor) {
        match winner {
            Actor::Human => self.human += 1,
            Actor::Ai => self.ai += 1,
        }
    }

    pub fn games(&self) -> u32 {
        self.human + self.ai
    }

    pub fn wins(&self, actor: Actor) -> u32 {
        match actor {
            Actor::Human => self.human,
            Actor::Ai => self.ai,
        }
    }
}

impl fmt::Display for WinTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Human {} - {} AI", self.human, self.ai)
    }
}

/// Everything the coordinator knows about the live game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub stones: GameState,
    pub tally: WinTally,
    /// Winner of the most recent finished game
    pub last_winner: Option<Actor>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::AwaitingUpload,
            stones: GameState::new(),
            tally: WinTally::default(),
            last_winner: None,
        }
    }
}

/// Scores the agent sees at one state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub state: GameState,
    /// `None` for moves that would take more stones than remain
    pub scores: [Option<f64>; 3],
    pub best: Option<Action>,
}

impl Insights {
    pub fn new(table: &PolicyTable, state: GameState) -> Self {
        let row = table.row(state);
        let scores = Action::ALL.map(|action| action.is_legal(state).then(|| row[action.index()]));
        Self {
            state,
            scores,
            best: table.greedy_action(state),
        }
    }
}

impl fmt::Display for Insights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>2}:", self.state)?;
        for (action, score) in Action::ALL.iter().zip(self.scores) {
            match score {
                Some(value) => write!(f, "  take {action} {value:>7.3}")?,
                None => write!(f, "  take {action}       -")?,
            }
        }
        match self.best {
            Some(best) => write!(f, "  best {best}"),
            None => write!(f, "  game over"),
        }
    }
}
