//! Condition wait requests and the park/unpark primitive.
//!
//! A [`WaitRequest`] is the parked state of a process: blocked on a delay or
//! on a named condition. Its result slot is written at most once, either by
//! a releaser ([`WaitRequest::set_result`]) or by the timeout event
//! ([`WaitRequest::set_timed_out`]).
//!
//! Parking is message passing: every process owns a [`Parker`] and the
//! controller keeps the matching [`Unparker`]. A wake sent before the process
//! actually parks is buffered, so no wakeup is ever lost.

use std::fmt;

use crossbeam_channel::{Receiver, Sender};
use meridian_types::{EventId, ProcessId, WaitId};
use parking_lot::Mutex;

use crate::SimError;

/// Reserved result of a wait whose timeout fired before any release.
///
/// Releasers may never deliver this value.
pub const TIMED_OUT: &str = "TimeOut";

/// Single-slot result of a wait request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitResult {
    Unset,
    Message(String),
    TimedOut,
}

/// How a condition wait ended, as seen by the waiting process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Released(String),
    TimedOut,
}

impl WaitOutcome {
    /// The delivered message, or [`TIMED_OUT`].
    pub fn as_str(&self) -> &str {
        match self {
            WaitOutcome::Released(message) => message,
            WaitOutcome::TimedOut => TIMED_OUT,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blocked process, waiting on a delay or on a condition.
#[derive(Debug)]
pub struct WaitRequest {
    id: WaitId,
    /// Scheduler-wide registration order, shared by every controller.
    arrival: u64,
    process: ProcessId,
    condition: Option<String>,
    timeout_event: Option<EventId>,
    result: Mutex<WaitResult>,
}

impl WaitRequest {
    pub fn new(
        id: WaitId,
        arrival: u64,
        process: ProcessId,
        condition: Option<String>,
        timeout_event: Option<EventId>,
    ) -> Self {
        Self {
            id,
            arrival,
            process,
            condition,
            timeout_event,
            result: Mutex::new(WaitResult::Unset),
        }
    }

    pub fn id(&self) -> WaitId {
        self.id
    }

    /// Lower means registered earlier, across all controllers of a scheduler.
    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// `None` for a plain delay.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn timeout_event(&self) -> Option<EventId> {
        self.timeout_event
    }

    /// Delivers a release message.
    ///
    /// # Errors
    ///
    /// [`SimError::IllegalWaitResult`] for the [`TIMED_OUT`] sentinel and
    /// [`SimError::WaitAlreadyResolved`] when a result is already set.
    pub fn set_result(&self, message: &str) -> Result<(), SimError> {
        if message == TIMED_OUT {
            return Err(SimError::IllegalWaitResult(message.to_string()));
        }
        let mut result = self.result.lock();
        if *result != WaitResult::Unset {
            return Err(SimError::WaitAlreadyResolved(self.id));
        }
        *result = WaitResult::Message(message.to_string());
        Ok(())
    }

    /// Marks the wait as timed out.
    pub fn set_timed_out(&self) -> Result<(), SimError> {
        let mut result = self.result.lock();
        if *result != WaitResult::Unset {
            return Err(SimError::WaitAlreadyResolved(self.id));
        }
        *result = WaitResult::TimedOut;
        Ok(())
    }

    pub fn is_timed_out(&self) -> bool {
        *self.result.lock() == WaitResult::TimedOut
    }

    pub fn is_resolved(&self) -> bool {
        *self.result.lock() != WaitResult::Unset
    }

    pub fn result(&self) -> WaitResult {
        self.result.lock().clone()
    }

    /// The result as a string: the message, [`TIMED_OUT`], or `None`.
    pub fn message(&self) -> Option<String> {
        match &*self.result.lock() {
            WaitResult::Unset => None,
            WaitResult::Message(message) => Some(message.clone()),
            WaitResult::TimedOut => Some(TIMED_OUT.to_string()),
        }
    }

    pub(crate) fn outcome(&self) -> Option<WaitOutcome> {
        match &*self.result.lock() {
            WaitResult::Unset => None,
            WaitResult::Message(message) => Some(WaitOutcome::Released(message.clone())),
            WaitResult::TimedOut => Some(WaitOutcome::TimedOut),
        }
    }
}

// ============================================================================
// Park / unpark
// ============================================================================

/// What a parked process is woken with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// The wait is over; read the request's result.
    Resume,
    /// A deferred release went through, releasing this many waiters.
    Released(usize),
    /// The controller is quitting.
    Abort,
}

#[derive(Debug, Clone)]
pub(crate) struct Unparker {
    tx: Sender<Wake>,
}

#[derive(Debug)]
pub(crate) struct Parker {
    rx: Receiver<Wake>,
}

pub(crate) fn parker() -> (Unparker, Parker) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (Unparker { tx }, Parker { rx })
}

impl Unparker {
    pub(crate) fn unpark(&self, wake: Wake) {
        // The process may already be gone after an abort.
        let _ = self.tx.send(wake);
    }
}

impl Parker {
    /// Blocks until woken. A dropped controller counts as an abort.
    pub(crate) fn park(&self) -> Wake {
        self.rx.recv().unwrap_or(Wake::Abort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use test_case::test_case;

    fn request() -> WaitRequest {
        WaitRequest::new(WaitId::new(1), 1, ProcessId::new(1), Some("X".into()), None)
    }

    #[test]
    fn result_is_set_once() {
        let wait = request();
        assert_eq!(wait.result(), WaitResult::Unset);
        assert!(wait.message().is_none());

        wait.set_result("go").unwrap();
        assert_eq!(wait.message().as_deref(), Some("go"));
        assert!(matches!(
            wait.set_result("again"),
            Err(SimError::WaitAlreadyResolved(_))
        ));
        assert!(wait.set_timed_out().is_err());
        assert_eq!(wait.outcome(), Some(WaitOutcome::Released("go".into())));
    }

    #[test]
    fn timed_out_reports_sentinel_and_rejects_it_afterwards() {
        let wait = request();
        wait.set_timed_out().unwrap();

        assert!(wait.is_timed_out());
        assert_eq!(wait.message().as_deref(), Some(TIMED_OUT));
        assert!(matches!(
            wait.set_result(TIMED_OUT),
            Err(SimError::IllegalWaitResult(_))
        ));
    }

    #[test_case("go", false ; "message")]
    #[test_case("", false ; "empty message")]
    #[test_case("timeout", false ; "case differs")]
    #[test_case(TIMED_OUT, true ; "sentinel")]
    fn sentinel_is_rejected(message: &str, rejected: bool) {
        let wait = request();
        assert_eq!(wait.set_result(message).is_err(), rejected);
        assert_eq!(wait.is_resolved(), !rejected);
    }

    #[test]
    fn outcome_strings() {
        assert_eq!(WaitOutcome::TimedOut.as_str(), TIMED_OUT);
        assert_eq!(WaitOutcome::Released("ok".into()).to_string(), "ok");
        assert!(WaitOutcome::TimedOut.is_timed_out());
    }

    #[test]
    fn unpark_before_park_is_not_lost() {
        let (unparker, parker) = parker();
        unparker.unpark(Wake::Released(2));
        assert_eq!(parker.park(), Wake::Released(2));
    }

    #[test]
    fn park_blocks_until_unparked() {
        let (unparker, parker) = parker();
        let handle = thread::spawn(move || parker.park());
        unparker.unpark(Wake::Resume);
        assert_eq!(handle.join().unwrap(), Wake::Resume);
    }

    #[test]
    fn dropped_unparker_aborts() {
        let (unparker, parker) = parker();
        drop(unparker);
        assert_eq!(parker.park(), Wake::Abort);
    }
}
