//! The two programming models offered to model code.
//!
//! - **Event-driven**: callbacks receive an [`EventContext`] and schedule
//!   further instant callbacks on their own model.
//! - **Process-driven**: process bodies receive a [`ProcessContext`], which
//!   adds waits, condition releases and access to the model state.
//!
//! Both delegate everything to the model's [`SimulationController`].

use meridian_types::{EventId, ModelId, ProcessId, Ticks, TimeDomain, VirtualTime};

use crate::controller::SimulationController;
use crate::scheduler::ReleaseScope;
use crate::value::Value;
use crate::wait::{Parker, WaitOutcome};
use crate::SimError;

/// Scheduling calls shared by both programming models.
pub trait EventScheduling<U: TimeDomain = Ticks> {
    /// Current virtual time of the model.
    fn now(&self) -> VirtualTime<U>;

    /// Schedules the instant callback `name` at `time`.
    ///
    /// Dispatch is instantaneous: running the callback never advances time.
    fn schedule_event_myself(
        &self,
        name: &str,
        args: Vec<Value>,
        time: VirtualTime<U>,
    ) -> Result<EventId, SimError>;

    /// Cancels a pending event. `false` if it already fired or never existed.
    fn cancel_event(&self, id: EventId) -> bool;
}

/// Process-mode scheduling calls.
pub trait ProcessScheduling<U: TimeDomain = Ticks>: EventScheduling<U> {
    /// Schedules a new long-lived process running `name` at `time`.
    fn schedule_process_myself(
        &self,
        name: &str,
        args: Vec<Value>,
        time: VirtualTime<U>,
    ) -> Result<EventId, SimError>;

    /// Parks the calling process until `now + delay`.
    fn wait_for_delay(&self, delay: U) -> Result<(), SimError>;

    /// Parks the calling process until `condition` is released or `delay`
    /// elapses. A negative delay waits without a timeout.
    fn wait_on_condition_for_delay(&self, condition: &str, delay: U)
        -> Result<WaitOutcome, SimError>;

    /// Delivers `message` to the oldest wait on `condition`. Returns whether
    /// one was found.
    fn release_one_on_condition(&self, condition: &str, message: &str) -> Result<bool, SimError>;

    /// Delivers `message` to every wait on `condition`. Returns how many.
    fn release_all_on_condition(&self, condition: &str, message: &str)
        -> Result<usize, SimError>;
}

// ============================================================================
// Event context
// ============================================================================

/// Handed to instant callbacks and init hooks.
pub struct EventContext<M, U: TimeDomain = Ticks> {
    controller: SimulationController<M, U>,
}

impl<M: Send + 'static, U: TimeDomain> EventContext<M, U> {
    pub(crate) fn new(controller: SimulationController<M, U>) -> Self {
        Self { controller }
    }

    pub fn model_id(&self) -> ModelId {
        self.controller.model_id()
    }

    /// Schedules `name` at `now + delay`.
    pub fn schedule_event_in(
        &self,
        name: &str,
        args: Vec<Value>,
        delay: U,
    ) -> Result<EventId, SimError> {
        self.controller.schedule_event_in(name, args, delay)
    }

    /// Schedules a new process on this model, e.g. from an init hook.
    pub fn schedule_process_myself(
        &self,
        name: &str,
        args: Vec<Value>,
        time: VirtualTime<U>,
    ) -> Result<EventId, SimError> {
        self.controller.schedule_process_myself(name, args, time)
    }
}

impl<M: Send + 'static, U: TimeDomain> EventScheduling<U> for EventContext<M, U> {
    fn now(&self) -> VirtualTime<U> {
        self.controller.now()
    }

    fn schedule_event_myself(
        &self,
        name: &str,
        args: Vec<Value>,
        time: VirtualTime<U>,
    ) -> Result<EventId, SimError> {
        self.controller.schedule_event_myself(name, args, time)
    }

    fn cancel_event(&self, id: EventId) -> bool {
        self.controller.cancel_event(id)
    }
}

// ============================================================================
// Process context
// ============================================================================

/// Handed to process bodies. Owned by the process thread.
pub struct ProcessContext<M, U: TimeDomain = Ticks> {
    controller: SimulationController<M, U>,
    process: ProcessId,
    parker: Parker,
}

impl<M: Send + 'static, U: TimeDomain> ProcessContext<M, U> {
    pub(crate) fn new(
        controller: SimulationController<M, U>,
        process: ProcessId,
        parker: Parker,
    ) -> Self {
        Self {
            controller,
            process,
            parker,
        }
    }

    pub fn model_id(&self) -> ModelId {
        self.controller.model_id()
    }

    pub fn process_id(&self) -> ProcessId {
        self.process
    }

    /// Runs `f` with exclusive access to the model state.
    ///
    /// Do not wait from inside `f`: the model stays locked while parked.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        self.controller.with_state(f)
    }

    /// Waits on `condition` with no timeout.
    pub fn wait_on_condition(&self, condition: &str) -> Result<WaitOutcome, SimError> {
        self.controller
            .wait_on_condition(self.process, &self.parker, condition, None)
    }

    pub fn schedule_event_in(
        &self,
        name: &str,
        args: Vec<Value>,
        delay: U,
    ) -> Result<EventId, SimError> {
        self.controller.schedule_event_in(name, args, delay)
    }
}

impl<M: Send + 'static, U: TimeDomain> EventScheduling<U> for ProcessContext<M, U> {
    fn now(&self) -> VirtualTime<U> {
        self.controller.now()
    }

    fn schedule_event_myself(
        &self,
        name: &str,
        args: Vec<Value>,
        time: VirtualTime<U>,
    ) -> Result<EventId, SimError> {
        self.controller.schedule_event_myself(name, args, time)
    }

    fn cancel_event(&self, id: EventId) -> bool {
        self.controller.cancel_event(id)
    }
}

impl<M: Send + 'static, U: TimeDomain> ProcessScheduling<U> for ProcessContext<M, U> {
    fn schedule_process_myself(
        &self,
        name: &str,
        args: Vec<Value>,
        time: VirtualTime<U>,
    ) -> Result<EventId, SimError> {
        self.controller.schedule_process_myself(name, args, time)
    }

    fn wait_for_delay(&self, delay: U) -> Result<(), SimError> {
        self.controller
            .wait_for_delay(self.process, &self.parker, delay)
    }

    fn wait_on_condition_for_delay(
        &self,
        condition: &str,
        delay: U,
    ) -> Result<WaitOutcome, SimError> {
        let timeout = (!delay.is_negative()).then_some(delay);
        self.controller
            .wait_on_condition(self.process, &self.parker, condition, timeout)
    }

    fn release_one_on_condition(&self, condition: &str, message: &str) -> Result<bool, SimError> {
        self.controller
            .release(
                self.process,
                &self.parker,
                condition,
                message,
                ReleaseScope::One,
            )
            .map(|released| released > 0)
    }

    fn release_all_on_condition(
        &self,
        condition: &str,
        message: &str,
    ) -> Result<usize, SimError> {
        self.controller.release(
            self.process,
            &self.parker,
            condition,
            message,
            ReleaseScope::All,
        )
    }
}
