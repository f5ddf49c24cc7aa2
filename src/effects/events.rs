//! Subscribe/trigger capability for subjects and targets.

use crate::effects::transition::TransitionRecord;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Event name whose listeners receive every event.
pub const ALL_EVENTS: &str = "all";

/// Payload attached to a triggered event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// A gated method call settled.
    Exec { method: String, args: Vec<Value> },
    /// A transition attempt settled or was applied.
    Transition(TransitionRecord),
}

/// Listener invoked with the event name and its payload.
pub type Listener = Arc<dyn Fn(&str, &EventPayload) + Send + Sync>;

/// Minimal event emitter.
///
/// Clones share their listener list.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<(String, Listener)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `event`, or to every event with [`ALL_EVENTS`].
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&str, &EventPayload) + Send + Sync + 'static,
    {
        self.lock().push((event.into(), Arc::new(listener)));
    }

    /// Remove every listener of `event`, returning how many were dropped.
    pub fn off(&self, event: &str) -> usize {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(name, _)| name != event);
        before - listeners.len()
    }

    /// Deliver `payload` to the listeners of `event` and to the catch-all listeners.
    pub fn trigger(&self, event: &str, payload: &EventPayload) {
        let matching: Vec<Listener> = self
            .lock()
            .iter()
            .filter(|(name, _)| name == event || name == ALL_EVENTS)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in matching {
            listener(event, payload);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
