//! State transition rules for the subtraction game
//!
//! Two sides alternate removing one to three stones from a pile of
//! [`INITIAL_STONES`]. The side that takes the last stone wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Stones on the pile at the start of every game
pub const INITIAL_STONES: u8 = 21;

/// Number of distinct states (0..=INITIAL_STONES)
pub const STATE_COUNT: usize = INITIAL_STONES as usize + 1;

/// Number of distinct actions
pub const ACTION_COUNT: usize = 3;

/// Number of stones remaining on the pile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameState {
    stones: u8,
}

impl GameState {
    /// Fresh game with the full pile
    pub fn new() -> Self {
        Self {
            stones: INITIAL_STONES,
        }
    }

    /// Game positioned at an arbitrary pile size
    pub fn at(stones: u8) -> Result<Self> {
        if stones > INITIAL_STONES {
            return Err(Error::InvalidConfiguration {
                message: format!("pile of {stones} exceeds {INITIAL_STONES} stones"),
            });
        }
        Ok(Self { stones })
    }

    pub fn stones(&self) -> u8 {
        self.stones
    }

    /// Row index into a policy table
    pub fn index(&self) -> usize {
        self.stones as usize
    }

    pub fn is_terminal(&self) -> bool {
        self.stones == 0
    }

    /// Legal actions in ascending index order
    pub fn legal_actions(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL
            .into_iter()
            .filter(move |action| action.value() <= self.stones)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stones)
    }
}

/// Removal of one, two or three stones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Take1,
    Take2,
    Take3,
}

impl Action {
    pub const ALL: [Action; ACTION_COUNT] = [Action::Take1, Action::Take2, Action::Take3];

    /// Stones removed by this action
    pub fn value(&self) -> u8 {
        match self {
            Action::Take1 => 1,
            Action::Take2 => 2,
            Action::Take3 => 3,
        }
    }

    /// Column index into a policy table row
    pub fn index(&self) -> usize {
        self.value() as usize - 1
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Convert a raw stone count, rejecting anything outside 1..=3
    pub fn from_value(take: u8, state: GameState) -> Result<Self> {
        match take {
            1 => Ok(Action::Take1),
            2 => Ok(Action::Take2),
            3 => Ok(Action::Take3),
            _ => Err(Error::InvalidAction {
                take,
                stones: state.stones(),
            }),
        }
    }

    pub fn is_legal(&self, state: GameState) -> bool {
        self.value() <= state.stones()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Side making a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// Person at the device; during training the opponent model plays this side
    Human,
    /// Policy-table agent
    Ai,
}

impl Actor {
    pub fn opponent(&self) -> Self {
        match self {
            Actor::Human => Actor::Ai,
            Actor::Ai => Actor::Human,
        }
    }

    /// Name used on the wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            Actor::Human => "Human",
            Actor::Ai => "AI",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "Human" => Some(Actor::Human),
            "AI" => Some(Actor::Ai),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Result of applying one action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub next_state: GameState,
    /// +1 when the agent empties the pile, -1 when the opponent does
    pub reward: f64,
    pub done: bool,
}

/// Apply `action` by `actor` to `state`
pub fn apply(state: GameState, action: Action, actor: Actor) -> Result<Transition> {
    if !action.is_legal(state) {
        return Err(Error::InvalidAction {
            take: action.value(),
            stones: state.stones(),
        });
    }

    let next_state = GameState {
        stones: state.stones() - action.value(),
    };
    let done = next_state.is_terminal();
    let reward = match (done, actor) {
        (true, Actor::Ai) => 1.0,
        (true, Actor::Human) => -1.0,
        (false, _) => 0.0,
    };

    Ok(Transition {
        next_state,
        reward,
        done,
    })
}

/// Apply a raw stone count, as received from input sources
pub fn apply_take(state: GameState, take: u8, actor: Actor) -> Result<Transition> {
    let action = Action::from_value(take, state)?;
    apply(state, action, actor)
}

/// Game-theoretic best move: leave a multiple of four.
///
/// From a multiple of four every move loses against perfect play; this takes
/// three. Returns `None` on an empty pile.
pub fn optimal_take(state: GameState) -> Option<Action> {
    if state.is_terminal() {
        return None;
    }
    let take = match state.stones() % 4 {
        0 => 3,
        remainder => remainder,
    };
    Action::from_index(take.min(state.stones()) as usize - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_subtracts_for_every_legal_action() {
        for stones in 1..=INITIAL_STONES {
            let state = GameState::at(stones).unwrap();
            for action in state.legal_actions() {
                let transition = apply(state, action, Actor::Ai).unwrap();
                assert_eq!(transition.next_state.stones(), stones - action.value());
                assert_eq!(transition.done, transition.next_state.stones() == 0);
            }
        }
    }

    #[test]
    fn test_apply_rejects_overdraw() {
        for stones in 0..3u8 {
            let state = GameState::at(stones).unwrap();
            for action in Action::ALL.iter().filter(|a| a.value() > stones) {
                let err = apply(state, *action, Actor::Human).unwrap_err();
                assert!(matches!(err, Error::InvalidAction { .. }));
            }
        }
    }

    #[test]
    fn test_apply_take_rejects_values_outside_range() {
        let state = GameState::new();
        for take in [0u8, 4, 7, 255] {
            let err = apply_take(state, take, Actor::Ai).unwrap_err();
            assert!(matches!(err, Error::InvalidAction { take: t, stones: 21 } if t == take));
        }
    }

    #[test]
    fn test_reward_depends_on_actor() {
        let state = GameState::at(2).unwrap();
        assert_eq!(apply(state, Action::Take2, Actor::Ai).unwrap().reward, 1.0);
        assert_eq!(
            apply(state, Action::Take2, Actor::Human).unwrap().reward,
            -1.0
        );
        assert_eq!(apply(state, Action::Take1, Actor::Ai).unwrap().reward, 0.0);
    }

    #[test]
    fn test_optimal_take_leaves_multiple_of_four() {
        assert_eq!(optimal_take(GameState::at(18).unwrap()), Some(Action::Take2));
        assert_eq!(optimal_take(GameState::at(21).unwrap()), Some(Action::Take1));
        assert_eq!(optimal_take(GameState::at(8).unwrap()), Some(Action::Take3));
        assert_eq!(optimal_take(GameState::at(3).unwrap()), Some(Action::Take3));
        assert_eq!(optimal_take(GameState::at(0).unwrap()), None);
    }

    #[test]
    fn test_legal_actions_shrink_near_the_end() {
        let legal: Vec<_> = GameState::at(2).unwrap().legal_actions().collect();
        assert_eq!(legal, vec![Action::Take1, Action::Take2]);
        assert_eq!(GameState::at(0).unwrap().legal_actions().count(), 0);
    }

    #[test]
    fn test_state_above_pile_size_is_rejected() {
        assert!(GameState::at(22).is_err());
    }
}
