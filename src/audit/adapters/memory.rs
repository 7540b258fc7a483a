//! In-memory activity sink for tests.

use crate::audit::{
    domain::ActivityEvent,
    ports::{ActivitySink, ActivitySinkError},
};
use std::sync::RwLock;

/// Keeps every recorded event in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    events: RwLock<Vec<ActivityEvent>>,
}

impl InMemoryActivityLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Returns the recorded events with the given name.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<ActivityEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.event == name)
            .collect()
    }
}

impl ActivitySink for InMemoryActivityLog {
    fn record(&self, event: &ActivityEvent) -> Result<(), ActivitySinkError> {
        let mut events = self
            .events
            .write()
            .map_err(|_| ActivitySinkError::Poisoned)?;
        events.push(event.clone());
        Ok(())
    }
}
