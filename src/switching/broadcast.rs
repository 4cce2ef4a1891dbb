//! Broadcasting of active selection changes to UI listeners.

use tokio::sync::broadcast;

use crate::types::{Environment, ProjectDirectory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// A switch completed, or an unchanged selection was confirmed.
    Changed {
        dir: ProjectDirectory,
        env: Environment,
    },
    /// No project is active anymore.
    Cleared,
}

/// Fan-out of selection events to any number of subscribers.
#[derive(Clone)]
pub struct SelectionBroadcaster {
    sender: broadcast::Sender<SelectionEvent>,
}

impl SelectionBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: SelectionEvent) {
        match self.sender.send(event.clone()) {
            Ok(count) => {
                crate::debug_event!("broadcast", "sent", "{event:?} to {count} subscribers");
            }
            Err(_) => {
                // No receivers, this is fine
                crate::debug_event!("broadcast", "dropped", "no subscribers for {event:?}");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.sender.subscribe()
    }
}

impl Default for SelectionBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
