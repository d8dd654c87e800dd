//! In-process event bus for lifecycle and dashboard updates.
//!
//! Backed by a `tokio::sync::broadcast` channel; share it via
//! `Arc<EventBus>`.

use horde_core::types::OutputId;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::session::{LifecycleKind, SessionState};

/// Something the front end may want to redraw for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HordeEvent {
    /// A lifecycle moved to a new state.
    StateChanged {
        kind: LifecycleKind,
        state: SessionState,
        remote_id: Option<String>,
    },

    /// A poll tick.
    Progress {
        kind: LifecycleKind,
        remote_id: String,
        /// Completion percentage (0-100).
        progress: f64,
        queue_position: u32,
        wait_time: f64,
    },

    /// Finished images were added to the output store.
    OutputsAdded {
        remote_id: String,
        ids: Vec<OutputId>,
    },

    /// A lifecycle failed; `message` is what was reported.
    Failed {
        kind: LifecycleKind,
        remote_id: Option<String>,
        message: String,
    },

    DashboardUpdated,

    WorkersUpdated { count: usize },
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

pub struct EventBus {
    sender: broadcast::Sender<HordeEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer fills.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped if there are none.
    pub fn publish(&self, event: HordeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HordeEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
