//! Event sink adapters

use std::sync::{Arc, Mutex};

use crate::ports::{EventSink, GameEvent};

/// Writes each move to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_event(&mut self, event: &GameEvent) {
        log::info!(
            "{} took {}, {} stones left",
            event.actor,
            event.action,
            event.state
        );
        if let Some(winner) = event.result {
            log::info!("{winner} wins");
        }
    }
}

/// Keeps every event; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for RecordingSink {
    fn on_event(&mut self, event: &GameEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(*event);
        }
    }
}
