//! Network notifications.
//!
//! Events are emitted during topology mutation and commit, then delivered in
//! batch at the end of the public operation that produced them. Delivery calls
//! passive listeners in registration order and moves the events into a
//! bounded buffer that collaborators can drain at their own pace.
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which drops them
//! at emission.

use std::collections::VecDeque;

use crate::sim::Ticks;
use crate::id::{NodeId, SegmentId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A network notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A segment's current state was replaced by a commit. Fired exactly once
    /// per live segment per commit.
    SegmentStateUpdated { segment: SegmentId, tick: Ticks },
    /// A segment's path changed (split, dissolve, node removal).
    SegmentPathUpdated { segment: SegmentId },
    SegmentCreated { segment: SegmentId },
    SegmentRemoved { segment: SegmentId },
    /// A node now belongs to a different segment. `from` is `None` for a
    /// newly registered node, `to` is `None` for a removed node.
    NodeSegmentChanged {
        node: NodeId,
        from: Option<SegmentId>,
        to: Option<SegmentId>,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SegmentStateUpdated,
    SegmentPathUpdated,
    SegmentCreated,
    SegmentRemoved,
    NodeSegmentChanged,
}

const EVENT_KIND_COUNT: usize = 5;

impl NetworkEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NetworkEvent::SegmentStateUpdated { .. } => EventKind::SegmentStateUpdated,
            NetworkEvent::SegmentPathUpdated { .. } => EventKind::SegmentPathUpdated,
            NetworkEvent::SegmentCreated { .. } => EventKind::SegmentCreated,
            NetworkEvent::SegmentRemoved { .. } => EventKind::SegmentRemoved,
            NetworkEvent::NodeSegmentChanged { .. } => EventKind::NodeSegmentChanged,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        match self {
            EventKind::SegmentStateUpdated => 0,
            EventKind::SegmentPathUpdated => 1,
            EventKind::SegmentCreated => 2,
            EventKind::SegmentRemoved => 3,
            EventKind::NodeSegmentChanged => 4,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&NetworkEvent) + Send>;

/// Buffered event delivery for one network.
pub struct EventBus {
    /// Emitted since the last delivery.
    pending: Vec<NetworkEvent>,
    /// Delivered and not yet drained. Oldest entries are dropped at capacity.
    delivered: VecDeque<NetworkEvent>,
    capacity: usize,
    dropped: u64,
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: Vec<(Option<EventKind>, PassiveListener)>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending.len())
            .field("delivered", &self.delivered.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped)
            .field("suppressed", &self.suppressed)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            delivered: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Vec::new(),
        }
    }

    /// Suppress an event kind. Suppressed events are never buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn emit(&mut self, event: NetworkEvent) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        self.pending.push(event);
    }

    /// Listen to every event kind.
    pub fn on_any(&mut self, listener: PassiveListener) {
        self.listeners.push((None, listener));
    }

    /// Listen to one event kind.
    pub fn on(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners.push((Some(kind), listener));
    }

    /// Hand pending events to listeners and move them to the drain buffer.
    pub fn deliver(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            let kind = event.kind();
            for (filter, listener) in &mut self.listeners {
                if filter.is_none_or(|k| k == kind) {
                    listener(event);
                }
            }
        }
        for event in events {
            if self.delivered.len() == self.capacity {
                self.delivered.pop_front();
                self.dropped += 1;
            }
            self.delivered.push_back(event);
        }
    }

    /// Take every delivered event, oldest first.
    pub fn drain(&mut self) -> Vec<NetworkEvent> {
        self.delivered.drain(..).collect()
    }

    pub fn buffered_count(&self) -> usize {
        self.delivered.len()
    }

    /// Events discarded because the drain buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
