//! Human input port

use crate::{
    Error, Result,
    game::{Action, GameState},
};

/// Source of the human player's moves
pub trait HumanInput {
    /// Next proposed move at `state`. `Ok(None)` means the player quit.
    fn next_action(&mut self, state: GameState) -> Result<Option<Action>>;

    /// Told when the proposed move was refused; the session asks again.
    fn reject(&mut self, _state: GameState, _error: &Error) {}
}
