//! # meridian-types: Core types for `Meridian`
//!
//! This crate contains the value types shared across the Meridian
//! simulation kernel:
//! - Virtual time ([`VirtualTime`], [`TimeDomain`], [`Ticks`])
//! - Time units ([`TimeUnit`])
//! - Entity IDs ([`EventId`], [`ModelId`], [`ProcessId`], [`WaitId`])
//! - The scheduler's [`ExecutionMode`]
//! - Errors ([`TimeError`])

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

mod error;
mod time;
mod unit;

pub use error::TimeError;
pub use time::{Ticks, TimeDomain, VirtualTime};
pub use unit::TimeUnit;

// ============================================================================
// Entity IDs - All Copy (cheap values)
// ============================================================================

/// Source of every [`EventId`] in the process.
///
/// Initialized once, never reset: ids stay unique and increasing across all
/// controllers and all simulations living in the same process.
static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Globally unique, monotonically assigned event identifier.
///
/// Ids double as the same-deadline tie-break: of two events due at the same
/// virtual time, the one created first runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// Allocates the next id from the process-wide sequence.
    pub fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl From<EventId> for u64 {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Identifier of a model component, assigned by the super-scheduler at
/// registration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ModelId(u32);

impl ModelId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Identifier of a process-mode logical thread, unique within its controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(u64);

impl ProcessId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Identifier of a wait request, unique within its controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WaitId(u64);

impl WaitId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for WaitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "W{}", self.0)
    }
}

// ============================================================================
// Execution mode
// ============================================================================

/// How the super-scheduler hands control to model components.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Every event runs to completion on the scheduler thread. Process-mode
    /// models are rejected.
    Synchronous,
    /// Process-mode events run on their own logical threads and hand control
    /// back to the scheduler through signals.
    #[default]
    Asynchronous,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn event_ids_increase() {
        let a = EventId::next();
        let b = EventId::next();
        let c = EventId::next();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn event_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..1_000).map(|_| EventId::next()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.join().expect("id thread panicked");
            // Per-thread assignment order is preserved.
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(seen.insert(id), "duplicate event id {id}");
            }
        }
        assert_eq!(seen.len(), 8_000);
    }

    #[test]
    fn id_display() {
        assert_eq!(ModelId::new(3).to_string(), "M3");
        assert_eq!(ProcessId::new(7).to_string(), "P7");
        assert_eq!(WaitId::new(9).to_string(), "W9");
    }

    #[test]
    fn execution_mode_serializes_kebab_case() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Asynchronous);
        assert_eq!(
            serde_json::to_string(&ExecutionMode::Synchronous).unwrap(),
            "\"synchronous\""
        );
        let mode: ExecutionMode = serde_json::from_str("\"asynchronous\"").unwrap();
        assert_eq!(mode, ExecutionMode::Asynchronous);
    }
}
