//! Event sink port - where finished turns are displayed

use serde::{Deserialize, Serialize};

use crate::game::{Action, Actor, GameState};

/// One applied move, as shown to whoever is watching the game
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Pile size after the move
    pub state: GameState,
    pub actor: Actor,
    pub action: Action,
    /// Winner, when this move ended the game
    pub result: Option<Actor>,
}

/// Receives every move the session applies, in order
pub trait EventSink {
    fn on_event(&mut self, event: &GameEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn on_event(&mut self, event: &GameEvent) {
        (**self).on_event(event)
    }
}
