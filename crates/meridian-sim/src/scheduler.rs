//! The super-scheduler: single global arbiter of virtual time.
//!
//! # Main loop
//!
//! ```text
//! loop:
//!   all process threads are parked, every controller reports its earliest deadline
//!   (t, id) = min over controllers of (next deadline, next event id)
//!   if t > now and a release is pending: carry it out, resume the releaser, await its signal
//!   if t == Never: stop
//!   now = t; controller.resume_next(t)
//!   if a thread was started or resumed: park until it signals
//! ```
//!
//! Releases issued by processes are deferred until every other event due at
//! the current time has been dispatched. A waiter that reaches its wait point
//! at the same virtual time as the release therefore always receives it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use meridian_config::{MeridianConfig, SchedulerSettings};
use meridian_types::{
    EventId, ExecutionMode, ModelId, ProcessId, Ticks, TimeDomain, VirtualTime,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, info_span, trace};

use crate::control::ProcessControl;
use crate::controller::SimulationController;
use crate::model::Model;
use crate::wait::{Unparker, Wake, TIMED_OUT};
use crate::SimError;

// ============================================================================
// Configuration and results
// ============================================================================

/// Super-scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig<U: TimeDomain = Ticks> {
    pub mode: ExecutionMode,
    /// Events due strictly after this time are not dispatched.
    pub horizon: Option<VirtualTime<U>>,
    /// Upper bound on dispatched events.
    pub max_events: Option<u64>,
}

impl<U: TimeDomain> Default for SchedulerConfig<U> {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Asynchronous,
            horizon: None,
            max_events: None,
        }
    }
}

impl<U: TimeDomain> SchedulerConfig<U> {
    pub fn synchronous() -> Self {
        Self {
            mode: ExecutionMode::Synchronous,
            ..Self::default()
        }
    }

    pub fn asynchronous() -> Self {
        Self::default()
    }

    pub fn with_horizon(mut self, horizon: VirtualTime<U>) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = Some(max_events);
        self
    }

    /// Builds the scheduler configuration from loaded settings.
    pub fn from_settings(settings: &SchedulerSettings) -> Result<Self, SimError> {
        settings.validate()?;
        let horizon = settings
            .horizon_ticks()?
            .map(VirtualTime::from_ticks)
            .transpose()?;
        Ok(Self {
            mode: settings.mode,
            horizon,
            max_events: settings.max_events,
        })
    }
}

/// Why [`SuperScheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No controller has a pending event.
    Exhausted,
    /// The next event is past the horizon.
    Horizon,
    /// The event budget is spent.
    MaxEvents,
}

/// Outcome of one main-loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<U: TimeDomain = Ticks> {
    Dispatched {
        model: ModelId,
        time: VirtualTime<U>,
        /// A logical thread ran before control came back.
        resumed_thread: bool,
    },
    Released {
        model: ModelId,
        condition: String,
        released: usize,
    },
    Stopped(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary<U: TimeDomain = Ticks> {
    pub events_dispatched: u64,
    pub releases_processed: u64,
    pub processes_started: u64,
    pub final_time: VirtualTime<U>,
    pub stop_reason: StopReason,
}

// ============================================================================
// Scheduler link
// ============================================================================

/// What a process thread tells the parked scheduler.
#[derive(Debug)]
pub(crate) enum Signal {
    /// The running thread finished or suspended at a wait.
    EventComplete,
    /// The running thread stopped mid-event on a deferred release.
    EventStopped,
    Failed {
        model: ModelId,
        process: ProcessId,
        error: SimError,
    },
    Panicked {
        model: ModelId,
        process: ProcessId,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseScope {
    One,
    All,
}

/// A release issued by a process, waiting for the end of the time step.
#[derive(Debug)]
pub(crate) struct PendingRelease {
    pub(crate) condition: String,
    pub(crate) message: String,
    pub(crate) scope: ReleaseScope,
    pub(crate) model: ModelId,
    pub(crate) process: ProcessId,
    pub(crate) reply: Unparker,
}

/// State shared between the scheduler and its controllers.
#[derive(Debug)]
pub(crate) struct SchedulerLink<U: TimeDomain> {
    now: Mutex<VirtualTime<U>>,
    signals: Sender<Signal>,
    pending: Mutex<VecDeque<PendingRelease>>,
    /// Stamps wait requests in registration order across controllers.
    arrivals: AtomicU64,
    mode: ExecutionMode,
}

impl<U: TimeDomain> SchedulerLink<U> {
    fn new(mode: ExecutionMode, signals: Sender<Signal>) -> Self {
        Self {
            now: Mutex::new(VirtualTime::zero()),
            signals,
            pending: Mutex::new(VecDeque::new()),
            arrivals: AtomicU64::new(1),
            mode,
        }
    }

    pub(crate) fn next_arrival(&self) -> u64 {
        self.arrivals.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn now(&self) -> VirtualTime<U> {
        *self.now.lock()
    }

    fn set_now(&self, time: VirtualTime<U>) {
        *self.now.lock() = time;
    }

    pub(crate) fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Wakes the scheduler parked in [`SuperScheduler::park_scheduler_thread`].
    pub(crate) fn resume_scheduler_thread(&self, signal: Signal) {
        // Only fails once the scheduler is gone, and then nobody is listening.
        let _ = self.signals.send(signal);
    }

    pub(crate) fn defer_release(&self, release: PendingRelease) {
        self.pending.lock().push_back(release);
    }

    fn take_release(&self) -> Option<PendingRelease> {
        self.pending.lock().pop_front()
    }

    fn has_pending_release(&self) -> bool {
        !self.pending.lock().is_empty()
    }
}

// ============================================================================
// Super-scheduler
// ============================================================================

/// Drives every registered controller along one global timeline.
pub struct SuperScheduler<U: TimeDomain = Ticks> {
    name: String,
    config: SchedulerConfig<U>,
    link: Arc<SchedulerLink<U>>,
    signals: Receiver<Signal>,
    controllers: Vec<Arc<dyn ProcessControl<U>>>,
    initialized: bool,
    stopped: bool,
    events_dispatched: u64,
    releases_processed: u64,
}

impl<U: TimeDomain> SuperScheduler<U> {
    pub fn new(config: SchedulerConfig<U>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            name: "meridian-simulation".to_string(),
            link: Arc::new(SchedulerLink::new(config.mode, tx)),
            config,
            signals: rx,
            controllers: Vec::new(),
            initialized: false,
            stopped: false,
            events_dispatched: 0,
            releases_processed: 0,
        }
    }

    /// Builds a scheduler from a loaded [`MeridianConfig`].
    pub fn from_config(config: &MeridianConfig) -> Result<Self, SimError> {
        let scheduler = Self::new(SchedulerConfig::from_settings(&config.scheduler)?);
        Ok(scheduler.named(config.simulation.name.clone()))
    }

    /// Sets the name attached to the run's log span.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SchedulerConfig<U> {
        &self.config
    }

    /// Global virtual time.
    pub fn now(&self) -> VirtualTime<U> {
        self.link.now()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Binds a model to a new controller of this scheduler.
    ///
    /// Registration closes once the run has started.
    pub fn register<M: Send + 'static>(
        &mut self,
        model: Model<M, U>,
    ) -> Result<SimulationController<M, U>, SimError> {
        if self.initialized || self.stopped {
            return Err(SimError::ProtocolViolation(format!(
                "cannot register {:?} after the simulation started",
                model.name
            )));
        }
        let id = u32::try_from(self.controllers.len())
            .map(ModelId::new)
            .map_err(|_| SimError::ProtocolViolation("too many models".to_string()))?;

        let controller = SimulationController::new(id, model, Arc::clone(&self.link));
        debug!(model = %id, name = controller.name(), "model registered");
        self.controllers.push(Arc::new(controller.clone()));
        Ok(controller)
    }

    /// Runs every controller's `init`. Idempotent; called by the first step.
    pub fn init(&mut self) -> Result<(), SimError> {
        if self.initialized {
            return Ok(());
        }
        if self.stopped {
            return Err(SimError::ProtocolViolation("scheduler has quit".to_string()));
        }
        self.initialized = true;
        for controller in &self.controllers {
            controller.init()?;
        }
        Ok(())
    }

    /// Earliest `(deadline, event id, controller index)` across controllers.
    fn next_in_line(&self) -> Option<(VirtualTime<U>, EventId, usize)> {
        self.controllers
            .iter()
            .enumerate()
            .filter_map(|(index, controller)| {
                let time = controller.next_schedule_time();
                if time.is_infinite() {
                    return None;
                }
                controller.next_event_id().map(|id| (time, id, index))
            })
            .min()
    }

    /// Deadline of the globally earliest pending event.
    pub fn next_schedule_time(&self) -> VirtualTime<U> {
        self.next_in_line()
            .map_or(VirtualTime::Never, |(time, _, _)| time)
    }

    /// Runs exactly one iteration of the main loop.
    pub fn step(&mut self) -> Result<Step<U>, SimError> {
        if self.stopped {
            return Err(SimError::ProtocolViolation("scheduler has quit".to_string()));
        }
        self.init()?;

        let now = self.link.now();
        let next = self.next_in_line();
        let next_time = next.map_or(VirtualTime::Never, |(time, _, _)| time);

        if next_time.is_after(now) {
            if let Some(release) = self.link.take_release() {
                return self.process_release(release);
            }
        }

        let Some((time, event, index)) = next else {
            return Ok(Step::Stopped(StopReason::Exhausted));
        };
        if self.config.horizon.is_some_and(|horizon| time.is_after(horizon)) {
            return Ok(Step::Stopped(StopReason::Horizon));
        }
        if self
            .config
            .max_events
            .is_some_and(|max| self.events_dispatched >= max)
        {
            return Ok(Step::Stopped(StopReason::MaxEvents));
        }
        if time.is_before(now) {
            return Err(SimError::ProtocolViolation(format!(
                "{event} at {time} is behind the global time {now}"
            )));
        }

        self.link.set_now(time);
        let controller = Arc::clone(&self.controllers[index]);
        trace!(model = %controller.model_id(), %event, %time, "resume");
        let resumed_thread = controller.resume_next(time)?;
        self.events_dispatched += 1;

        if resumed_thread {
            if self.config.mode == ExecutionMode::Synchronous {
                return Err(SimError::ProtocolViolation(format!(
                    "{} handed control to a thread in synchronous mode",
                    controller.model_id()
                )));
            }
            self.park_scheduler_thread()?;
        }

        Ok(Step::Dispatched {
            model: controller.model_id(),
            time,
            resumed_thread,
        })
    }

    fn process_release(&mut self, release: PendingRelease) -> Result<Step<U>, SimError> {
        let PendingRelease {
            condition,
            message,
            scope,
            model,
            process,
            reply,
        } = release;

        let released = match scope {
            ReleaseScope::One => {
                usize::from(self.iterate_release_one_on_condition(&condition, &message)?)
            }
            ReleaseScope::All => self.iterate_release_all_on_condition(&condition, &message)?,
        };
        self.releases_processed += 1;
        debug!(%model, %process, condition, ?scope, released, time = %self.now(), "release processed");

        reply.unpark(Wake::Released(released));
        self.park_scheduler_thread()?;

        Ok(Step::Released {
            model,
            condition,
            released,
        })
    }

    /// Blocks until the thread holding control signals back.
    fn park_scheduler_thread(&self) -> Result<(), SimError> {
        match self.signals.recv() {
            Ok(Signal::EventComplete) => {
                trace!("event complete");
                Ok(())
            }
            Ok(Signal::EventStopped) => {
                trace!(pending_release = self.link.has_pending_release(), "event stopped");
                Ok(())
            }
            Ok(Signal::Failed {
                model,
                process,
                error,
            }) => Err(SimError::ProcessFailed {
                model,
                process,
                source: Box::new(error),
            }),
            Ok(Signal::Panicked {
                model,
                process,
                message,
            }) => Err(SimError::ProcessPanicked {
                model,
                process,
                message,
            }),
            Err(_) => Err(SimError::ProtocolViolation(
                "signal channel closed".to_string(),
            )),
        }
    }

    /// Runs the main loop until no event is left, the horizon is reached or
    /// the event budget is spent.
    ///
    /// Any error quits every controller before it is returned.
    pub fn run(&mut self) -> Result<RunSummary<U>, SimError> {
        let span = info_span!("simulation", name = %self.name);
        let _enter = span.enter();
        info!(
            models = self.controllers.len(),
            mode = ?self.config.mode,
            "simulation starting"
        );

        let stop_reason = loop {
            match self.step() {
                Ok(Step::Stopped(reason)) => break reason,
                Ok(_) => {}
                Err(err) => {
                    error!(error = %err, time = %self.now(), "simulation terminated");
                    self.quit();
                    return Err(err);
                }
            }
        };

        let summary = self.summary(stop_reason);
        info!(
            events = summary.events_dispatched,
            releases = summary.releases_processed,
            processes = summary.processes_started,
            final_time = %summary.final_time,
            stop_reason = ?summary.stop_reason,
            "simulation finished"
        );
        Ok(summary)
    }

    fn summary(&self, stop_reason: StopReason) -> RunSummary<U> {
        RunSummary {
            events_dispatched: self.events_dispatched,
            releases_processed: self.releases_processed,
            processes_started: self
                .controllers
                .iter()
                .map(|controller| controller.processes_started())
                .sum(),
            final_time: self.now(),
            stop_reason,
        }
    }

    /// Releases the wait on `condition` registered first, whichever
    /// controller holds it. Returns whether a wait was found.
    pub fn iterate_release_one_on_condition(
        &self,
        condition: &str,
        message: &str,
    ) -> Result<bool, SimError> {
        if message == TIMED_OUT {
            return Err(SimError::IllegalWaitResult(message.to_string()));
        }
        let oldest = self
            .controllers
            .iter()
            .filter_map(|controller| {
                controller
                    .oldest_wait_on(condition)
                    .map(|arrival| (arrival, controller))
            })
            .min_by_key(|(arrival, _)| *arrival);
        let Some((_, controller)) = oldest else {
            return Ok(false);
        };
        Ok(controller
            .try_release_one_on_condition(condition, message)?
            .released
            > 0)
    }

    /// Releases every wait on `condition` in every controller. Returns the
    /// number of waits released.
    pub fn iterate_release_all_on_condition(
        &self,
        condition: &str,
        message: &str,
    ) -> Result<usize, SimError> {
        if message == TIMED_OUT {
            return Err(SimError::IllegalWaitResult(message.to_string()));
        }
        let mut released = 0;
        for controller in &self.controllers {
            released += controller
                .proceed_release_all_on_condition(condition, message)?
                .released;
        }
        Ok(released)
    }

    /// Quits every controller, interrupting parked processes. Idempotent.
    pub fn quit(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        while self.link.take_release().is_some() {}
        for controller in &self.controllers {
            controller.quit();
        }
        debug!(name = %self.name, "scheduler stopped");
    }
}

impl<U: TimeDomain> Default for SuperScheduler<U> {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl<U: TimeDomain> Drop for SuperScheduler<U> {
    fn drop(&mut self) {
        self.quit();
    }
}

impl<U: TimeDomain> fmt::Debug for SuperScheduler<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperScheduler")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("now", &self.now())
            .field("controllers", &self.controllers.len())
            .field("events_dispatched", &self.events_dispatched)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EventScheduling;
    use crate::model::ModelBuilder;
    use crate::value::{Signature, Value, ValueKind};

    fn recorder(name: &str) -> Model<Vec<(i64, String)>> {
        ModelBuilder::new(name, Vec::new())
            .on_event("mark", Signature::exact([ValueKind::Text]), |log, ctx, args| {
                let tag = args[0].as_text().unwrap_or_default().to_string();
                log.push((ctx.now().get().unwrap_or(-1), tag));
                Ok(())
            })
            .build()
    }

    fn mark(tag: &str) -> Vec<Value> {
        vec![Value::from(tag)]
    }

    #[test]
    fn synchronous_run_orders_by_time_then_id() {
        let mut scheduler = SuperScheduler::new(SchedulerConfig::synchronous());
        let a = scheduler.register(recorder("a")).unwrap();
        let b = scheduler.register(recorder("b")).unwrap();

        b.schedule_event_myself("mark", mark("b5"), VirtualTime::at(5)).unwrap();
        a.schedule_event_myself("mark", mark("a5"), VirtualTime::at(5)).unwrap();
        a.schedule_event_myself("mark", mark("a2"), VirtualTime::at(2)).unwrap();

        let summary = scheduler.run().unwrap();
        assert_eq!(summary.events_dispatched, 3);
        assert_eq!(summary.stop_reason, StopReason::Exhausted);
        assert_eq!(summary.final_time, VirtualTime::at(5));

        assert_eq!(a.with_state(|log| log.clone()), [(2, "a2".into()), (5, "a5".into())]);
        assert_eq!(b.with_state(|log| log.clone()), [(5, "b5".into())]);
    }

    #[test]
    fn horizon_stops_before_late_events() {
        let config = SchedulerConfig::synchronous().with_horizon(VirtualTime::at(10));
        let mut scheduler = SuperScheduler::new(config);
        let a = scheduler.register(recorder("a")).unwrap();
        a.schedule_event_myself("mark", mark("in"), VirtualTime::at(10)).unwrap();
        a.schedule_event_myself("mark", mark("out"), VirtualTime::at(11)).unwrap();

        let summary = scheduler.run().unwrap();
        assert_eq!(summary.stop_reason, StopReason::Horizon);
        assert_eq!(summary.events_dispatched, 1);
        assert_eq!(a.pending_events(), 1);
    }

    #[test]
    fn max_events_caps_the_run() {
        let mut scheduler = SuperScheduler::new(SchedulerConfig::synchronous().with_max_events(2));
        let a = scheduler.register(recorder("a")).unwrap();
        for t in 0..5 {
            a.schedule_event_myself("mark", mark("x"), VirtualTime::at(t)).unwrap();
        }
        let summary = scheduler.run().unwrap();
        assert_eq!(summary.stop_reason, StopReason::MaxEvents);
        assert_eq!(summary.events_dispatched, 2);
    }

    #[test]
    fn empty_scheduler_is_exhausted_immediately() {
        let mut scheduler: SuperScheduler = SuperScheduler::default();
        assert_eq!(scheduler.step().unwrap(), Step::Stopped(StopReason::Exhausted));
        assert_eq!(scheduler.now(), VirtualTime::zero());
    }

    #[test]
    fn registration_closes_after_start() {
        let mut scheduler = SuperScheduler::new(SchedulerConfig::synchronous());
        scheduler.register(recorder("a")).unwrap();
        scheduler.step().unwrap();
        assert!(matches!(
            scheduler.register(recorder("late")),
            Err(SimError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn process_scheduling_is_rejected_in_synchronous_mode() {
        let mut scheduler = SuperScheduler::new(SchedulerConfig::synchronous());
        let model = ModelBuilder::new("p", ())
            .on_process("body", Signature::none(), |_, _| Ok(()))
            .build();
        let controller = scheduler.register(model).unwrap();
        assert!(matches!(
            controller.schedule_process_myself("body", Vec::new(), VirtualTime::at(1)),
            Err(SimError::ProcessModeDisabled(_))
        ));
    }

    #[test]
    fn config_from_settings() {
        let settings = SchedulerSettings {
            mode: ExecutionMode::Synchronous,
            horizon: Some("1 ns".to_string()),
            max_events: Some(9),
        };
        let config = SchedulerConfig::<Ticks>::from_settings(&settings).unwrap();
        assert_eq!(config.mode, ExecutionMode::Synchronous);
        assert_eq!(config.horizon, Some(VirtualTime::at(1_000)));
        assert_eq!(config.max_events, Some(9));
    }

    #[test]
    fn config_horizon_outside_the_domain_is_rejected() {
        let settings = SchedulerSettings {
            horizon: Some("1 d".to_string()),
            ..Default::default()
        };
        let err = SchedulerConfig::<i32>::from_settings(&settings).unwrap_err();
        assert!(matches!(err, SimError::Time(_)));
    }

    #[test]
    fn timed_out_sentinel_cannot_be_released() {
        let scheduler: SuperScheduler = SuperScheduler::default();
        assert!(matches!(
            scheduler.iterate_release_one_on_condition("X", TIMED_OUT),
            Err(SimError::IllegalWaitResult(_))
        ));
        assert_eq!(scheduler.iterate_release_all_on_condition("X", "go").unwrap(), 0);
    }
}
