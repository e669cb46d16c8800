//! Events and the per-controller pending queue.
//!
//! An [`Event`] is immutable once created. Its only mutation is removal from
//! the queue, either by dispatch or by cancellation.
//!
//! # Ordering
//!
//! The queue is keyed by `(deadline, id)`. Ids come from one process-wide
//! counter, so of two events due at the same time the one created first runs
//! first. The same key is used by the super-scheduler to break ties across
//! controllers.

use std::collections::{BTreeMap, HashMap};

use meridian_types::{EventId, ModelId, Ticks, TimeDomain, VirtualTime, WaitId};

use crate::value::Value;

/// What an event does when it fires.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// An instant callback, run to completion on the scheduler thread.
    Callback { name: String, args: Vec<Value> },
    /// Start of a long-lived process on its own logical thread.
    Process { name: String, args: Vec<Value> },
    /// Timeout of a condition wait.
    Timeout { wait: WaitId },
    /// Resumption of a parked process (delay elapsed or condition released).
    Wakeup { wait: WaitId },
}

impl EventKind {
    /// `true` for events created by model code, which may be cancelled.
    pub fn is_user_event(&self) -> bool {
        matches!(self, EventKind::Callback { .. } | EventKind::Process { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            EventKind::Callback { name, .. } | EventKind::Process { name, .. } => name,
            EventKind::Timeout { .. } => "<timeout>",
            EventKind::Wakeup { .. } => "<wakeup>",
        }
    }
}

/// A scheduled action.
#[derive(Debug, Clone)]
pub struct Event<U: TimeDomain = Ticks> {
    pub id: EventId,
    pub deadline: VirtualTime<U>,
    pub owner: ModelId,
    pub kind: EventKind,
}

impl<U: TimeDomain> Event<U> {
    /// Creates an event with a freshly allocated id.
    pub fn new(deadline: VirtualTime<U>, owner: ModelId, kind: EventKind) -> Self {
        Self {
            id: EventId::next(),
            deadline,
            owner,
            kind,
        }
    }

    fn key(&self) -> (VirtualTime<U>, EventId) {
        (self.deadline, self.id)
    }
}

/// Time-ordered queue of pending events with cancellation by id.
#[derive(Debug)]
pub struct EventQueue<U: TimeDomain = Ticks> {
    events: BTreeMap<(VirtualTime<U>, EventId), Event<U>>,
    deadlines: HashMap<EventId, VirtualTime<U>>,
}

impl<U: TimeDomain> EventQueue<U> {
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Inserts an event and returns its id.
    pub fn push(&mut self, event: Event<U>) -> EventId {
        let id = event.id;
        self.deadlines.insert(id, event.deadline);
        self.events.insert(event.key(), event);
        id
    }

    /// Removes and returns the earliest event.
    pub fn pop(&mut self) -> Option<Event<U>> {
        let (_, event) = self.events.pop_first()?;
        self.deadlines.remove(&event.id);
        Some(event)
    }

    /// Returns the earliest event without removing it.
    pub fn peek(&self) -> Option<&Event<U>> {
        self.events.values().next()
    }

    /// Deadline of the earliest event, or [`VirtualTime::Never`] when empty.
    pub fn next_time(&self) -> VirtualTime<U> {
        self.events
            .keys()
            .next()
            .map_or(VirtualTime::Never, |(time, _)| *time)
    }

    /// Id of the earliest event.
    pub fn next_id(&self) -> Option<EventId> {
        self.events.keys().next().map(|(_, id)| *id)
    }

    pub fn get(&self, id: EventId) -> Option<&Event<U>> {
        let deadline = self.deadlines.get(&id)?;
        self.events.get(&(*deadline, id))
    }

    /// Removes a pending event. Returns it if it was still queued.
    pub fn cancel(&mut self, id: EventId) -> Option<Event<U>> {
        let deadline = self.deadlines.remove(&id)?;
        self.events.remove(&(deadline, id))
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops every pending event.
    pub fn clear(&mut self) {
        self.events.clear();
        self.deadlines.clear();
    }
}

impl<U: TimeDomain> Default for EventQueue<U> {
    fn default() -> Self {
        Self::new()
    }
}
