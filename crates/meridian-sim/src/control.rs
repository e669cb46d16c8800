//! The contract between the super-scheduler and a model's controller.
//!
//! The scheduler only ever talks to controllers through these traits, so it
//! stays independent of the model state type `M`.

use meridian_types::{EventId, ModelId, Ticks, TimeDomain, VirtualTime};

use crate::event::Event;
use crate::wait::WaitRequest;
use crate::SimError;

/// Outcome of a release on one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Wait requests that received the message.
    pub released: usize,
    /// Wait requests still registered under the condition afterwards.
    pub remaining: usize,
}

/// Event-driven half of the controller contract.
pub trait SimulationControl<U: TimeDomain = Ticks>: Send + Sync {
    fn model_id(&self) -> ModelId;

    fn name(&self) -> &str;

    /// Runs the model's init hook. Called once, before the first
    /// [`resume_next`](Self::resume_next).
    fn init(&self) -> Result<(), SimError>;

    /// Dispatches the earliest pending event, which must be due at `current`.
    ///
    /// Returns `true` when dispatch started or resumed a logical thread; the
    /// caller must then wait for that thread's signal before advancing.
    ///
    /// # Errors
    ///
    /// [`SimError::SchedulingMismatch`] if the earliest deadline is not
    /// `current`. Nothing is dequeued in that case.
    fn resume_next(&self, current: VirtualTime<U>) -> Result<bool, SimError>;

    /// Deadline of the earliest pending event, [`VirtualTime::Never`] if none.
    fn next_schedule_time(&self) -> VirtualTime<U>;

    /// Id of the earliest pending event, for cross-controller tie-breaks.
    fn next_event_id(&self) -> Option<EventId>;

    /// Stops the controller. Idempotent.
    fn quit(&self);
}

/// Process-mode half of the controller contract.
pub trait ProcessControl<U: TimeDomain = Ticks>: SimulationControl<U> {
    /// Makes the process parked on `wait` runnable again.
    fn wake_up_thread(&self, wait: &WaitRequest) -> Result<(), SimError>;

    /// Starts a logical thread running the event's process callback.
    fn start_process(&self, event: Event<U>) -> Result<(), SimError>;

    /// `true` if a parked process is due to resume at the current time.
    fn resume_ready(&self) -> bool;

    /// Arrival stamp of the oldest wait registered under `condition`.
    fn oldest_wait_on(&self, condition: &str) -> Option<u64>;

    /// Delivers `message` to the oldest wait registered under `condition`.
    fn try_release_one_on_condition(
        &self,
        condition: &str,
        message: &str,
    ) -> Result<ReleaseReport, SimError>;

    /// Delivers `message` to every wait registered under `condition`.
    fn proceed_release_all_on_condition(
        &self,
        condition: &str,
        message: &str,
    ) -> Result<ReleaseReport, SimError>;

    /// Number of processes started so far.
    fn processes_started(&self) -> u64;
}
