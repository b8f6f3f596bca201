//! Routing of lifecycle events to registered listeners
//!
//! Each trigger name maps to at most one listener. An event goes to the
//! listener registered under its own name, or to the `all` listener when
//! there is none; with neither registered the event is dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::event::{EventKind, ProcessEvent, TickPayload};

/// A name listeners can be registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// The `start` event
    Start,
    /// Every `running` tick
    Running,
    /// The `finished` event
    Finished,
    /// Fallback for any event without a specific listener
    All,
}

impl Trigger {
    /// The registration name
    pub const fn as_str(self) -> &'static str {
        match self {
            Trigger::Start => "start",
            Trigger::Running => "running",
            Trigger::Finished => "finished",
            Trigger::All => "all",
        }
    }
}

impl From<EventKind> for Trigger {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Start => Trigger::Start,
            EventKind::Running => Trigger::Running,
            EventKind::Finished => Trigger::Finished,
        }
    }
}

impl FromStr for Trigger {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "start" => Ok(Trigger::Start),
            "running" => Ok(Trigger::Running),
            "finished" => Ok(Trigger::Finished),
            "all" => Ok(Trigger::All),
            other => Err(Error::UnknownTrigger {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives lifecycle events
pub trait Listener: Send {
    /// Handle one event
    fn on_event(&mut self, event: &ProcessEvent);
}

impl<F> Listener for F
where
    F: FnMut(&ProcessEvent) + Send,
{
    fn on_event(&mut self, event: &ProcessEvent) {
        self(event)
    }
}

/// Registry of listeners keyed by trigger
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<Trigger, Box<dyn Listener>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, returning the one it replaced
    pub fn register<L: Listener + 'static>(
        &mut self,
        trigger: Trigger,
        listener: L,
    ) -> Option<Box<dyn Listener>> {
        self.listeners.insert(trigger, Box::new(listener))
    }

    /// Whether a listener is registered under exactly this trigger
    pub fn is_registered(&self, trigger: Trigger) -> bool {
        self.listeners.contains_key(&trigger)
    }

    /// The trigger whose listener would receive `kind`
    pub fn resolve(&self, kind: EventKind) -> Option<Trigger> {
        let specific = Trigger::from(kind);
        if self.listeners.contains_key(&specific) {
            Some(specific)
        } else if self.listeners.contains_key(&Trigger::All) {
            Some(Trigger::All)
        } else {
            None
        }
    }

    /// Deliver an event; returns false when nobody was listening
    pub fn dispatch(&mut self, kind: EventKind, payload: Option<TickPayload>) -> bool {
        let Some(trigger) = self.resolve(kind) else {
            return false;
        };
        let event = ProcessEvent::new(kind, payload);
        match self.listeners.get_mut(&trigger) {
            Some(listener) => {
                listener.on_event(&event);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("triggers", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
