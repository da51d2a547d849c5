//! 21 stones game implementation

pub mod opponent;
pub mod rules;

pub use opponent::{OpponentModel, SkillRange};
pub use rules::{
    ACTION_COUNT, Action, Actor, GameState, INITIAL_STONES, STATE_COUNT, Transition, apply,
    apply_take, optimal_take,
};
