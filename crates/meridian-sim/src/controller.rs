//! Per-model simulation controller.
//!
//! A controller owns one model's pending-event queue and its condition
//! registry, and runs the model's callbacks:
//!
//! - instant events run to completion on the scheduler thread;
//! - processes run on their own OS thread, one per process, and hand control
//!   back to the scheduler each time they wait or finish.
//!
//! # Locking
//!
//! Two locks per controller: the model state and the local scheduling state.
//! The scheduling state is never held while the model lock is taken, and no
//! lock is held while a process is parked.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use meridian_types::{
    EventId, ExecutionMode, ModelId, ProcessId, Ticks, TimeDomain, VirtualTime, WaitId,
};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::api::{EventContext, ProcessContext};
use crate::control::{ProcessControl, ReleaseReport, SimulationControl};
use crate::dispatch::{Callback, CallbackRegistry, CallbackShape, InitFn, ProcessFn};
use crate::event::{Event, EventKind, EventQueue};
use crate::model::Model;
use crate::scheduler::{PendingRelease, ReleaseScope, SchedulerLink, Signal};
use crate::value::{describe_kinds, Value};
use crate::wait::{self, Parker, Unparker, Wake, WaitOutcome, WaitRequest, TIMED_OUT};
use crate::SimError;

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Registered, `init` not run yet.
    Created,
    /// Nothing pending.
    Idle,
    /// At least one pending event.
    Armed,
    /// An event or a process is executing.
    Running,
    /// A process is parked on a wait.
    Suspended,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessState {
    Running,
    Waiting,
    /// Parked until its deferred release has been carried out.
    Releasing,
    Finished,
}

struct ProcessSlot {
    unparker: Unparker,
    handle: Option<JoinHandle<()>>,
    state: ProcessState,
}

struct LocalState<U: TimeDomain> {
    now: VirtualTime<U>,
    queue: EventQueue<U>,
    /// FIFO of waits per condition name.
    conditions: HashMap<String, VecDeque<Arc<WaitRequest>>>,
    waits: HashMap<WaitId, Arc<WaitRequest>>,
    processes: HashMap<ProcessId, ProcessSlot>,
    next_wait: u64,
    next_process: u64,
    processes_started: u64,
    initialized: bool,
    dispatching: bool,
    stopped: bool,
}

impl<U: TimeDomain> LocalState<U> {
    fn new() -> Self {
        Self {
            now: VirtualTime::zero(),
            queue: EventQueue::new(),
            conditions: HashMap::new(),
            waits: HashMap::new(),
            processes: HashMap::new(),
            next_wait: 1,
            next_process: 1,
            processes_started: 0,
            initialized: false,
            dispatching: false,
            stopped: false,
        }
    }

    fn allocate_wait(&mut self) -> WaitId {
        let id = WaitId::new(self.next_wait);
        self.next_wait += 1;
        id
    }

    fn allocate_process(&mut self) -> ProcessId {
        let id = ProcessId::new(self.next_process);
        self.next_process += 1;
        id
    }

    fn set_process_state(&mut self, process: ProcessId, state: ProcessState) {
        if let Some(slot) = self.processes.get_mut(&process) {
            slot.state = state;
        }
    }

    fn remove_from_condition(&mut self, wait: &WaitRequest) {
        let Some(condition) = wait.condition() else {
            return;
        };
        if let Some(list) = self.conditions.get_mut(condition) {
            list.retain(|w| w.id() != wait.id());
            if list.is_empty() {
                self.conditions.remove(condition);
            }
        }
    }
}

struct ControllerInner<M, U: TimeDomain> {
    id: ModelId,
    name: String,
    model: Mutex<M>,
    registry: CallbackRegistry<M, U>,
    init: Option<InitFn<M, U>>,
    state: Mutex<LocalState<U>>,
    link: Arc<SchedulerLink<U>>,
}

/// Handle to one model's controller. Cheap to clone.
pub struct SimulationController<M, U: TimeDomain = Ticks> {
    inner: Arc<ControllerInner<M, U>>,
}

impl<M, U: TimeDomain> Clone for SimulationController<M, U> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M, U: TimeDomain> fmt::Debug for SimulationController<M, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationController")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl<M: Send + 'static, U: TimeDomain> SimulationController<M, U> {
    pub(crate) fn new(id: ModelId, model: Model<M, U>, link: Arc<SchedulerLink<U>>) -> Self {
        let Model {
            name,
            state,
            registry,
            init,
        } = model;
        Self {
            inner: Arc::new(ControllerInner {
                id,
                name,
                model: Mutex::new(state),
                registry,
                init,
                state: Mutex::new(LocalState::new()),
                link,
            }),
        }
    }

    pub fn model_id(&self) -> ModelId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Local virtual time. Never behind the scheduler's global time.
    pub fn now(&self) -> VirtualTime<U> {
        let state = self.inner.state.lock();
        self.current_time(&state)
    }

    pub fn phase(&self) -> ControllerPhase {
        let state = self.inner.state.lock();
        if state.stopped {
            return ControllerPhase::Stopped;
        }
        if !state.initialized {
            return ControllerPhase::Created;
        }
        let states = || state.processes.values().map(|slot| slot.state);
        if state.dispatching || states().any(|s| s == ProcessState::Running) {
            ControllerPhase::Running
        } else if states().any(|s| matches!(s, ProcessState::Waiting | ProcessState::Releasing)) {
            ControllerPhase::Suspended
        } else if state.queue.is_empty() {
            ControllerPhase::Idle
        } else {
            ControllerPhase::Armed
        }
    }

    /// Number of pending events, internal wakeups included.
    pub fn pending_events(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// `true` while the event is queued: not yet fired, not cancelled.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.inner.state.lock().queue.contains(id)
    }

    /// Number of processes blocked on `condition`.
    pub fn waiting_on(&self, condition: &str) -> usize {
        self.inner
            .state
            .lock()
            .conditions
            .get(condition)
            .map_or(0, VecDeque::len)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    /// Runs `f` with exclusive access to the model state.
    ///
    /// Must not be called from inside a callback of the same model, and a
    /// process must not wait from inside `f`.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        let mut model = self.inner.model.lock();
        f(&mut *model)
    }

    /// Schedules the instant callback `name` on this model at `time`.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownCallback`] / [`SimError::IllegalCallback`] when no
    /// event can be built for `name` and `args`, [`SimError::InvalidDeadline`]
    /// when `time` is infinite or in the past.
    pub fn schedule_event_myself(
        &self,
        name: &str,
        args: Vec<Value>,
        time: VirtualTime<U>,
    ) -> Result<EventId, SimError> {
        self.inner
            .registry
            .validate(self.inner.id, name, &args, CallbackShape::Event)?;
        self.enqueue(
            time,
            EventKind::Callback {
                name: name.to_string(),
                args,
            },
        )
    }

    /// Schedules `name` at `now + delay`.
    pub fn schedule_event_in(
        &self,
        name: &str,
        args: Vec<Value>,
        delay: U,
    ) -> Result<EventId, SimError> {
        if delay.is_negative() {
            return Err(SimError::NegativeDelay(delay.to_string()));
        }
        let time = self.now().delayed(delay)?;
        self.schedule_event_myself(name, args, time)
    }

    /// Schedules a new process running `name`, starting at `time`.
    pub fn schedule_process_myself(
        &self,
        name: &str,
        args: Vec<Value>,
        time: VirtualTime<U>,
    ) -> Result<EventId, SimError> {
        if self.inner.link.mode() == ExecutionMode::Synchronous {
            return Err(SimError::ProcessModeDisabled(self.inner.id));
        }
        self.inner
            .registry
            .validate(self.inner.id, name, &args, CallbackShape::Process)?;
        self.enqueue(
            time,
            EventKind::Process {
                name: name.to_string(),
                args,
            },
        )
    }

    /// Removes a pending event scheduled by the model.
    ///
    /// Returns `false` if it already fired or never existed.
    pub fn cancel_event(&self, id: EventId) -> bool {
        let mut state = self.inner.state.lock();
        let cancellable = state
            .queue
            .get(id)
            .is_some_and(|event| event.kind.is_user_event());
        if !cancellable {
            return false;
        }
        let cancelled = state.queue.cancel(id).is_some();
        trace!(model = %self.inner.id, event = %id, cancelled, "cancel");
        cancelled
    }

    fn current_time(&self, state: &LocalState<U>) -> VirtualTime<U> {
        state.now.max(self.inner.link.now())
    }

    fn enqueue(&self, deadline: VirtualTime<U>, kind: EventKind) -> Result<EventId, SimError> {
        let mut state = self.inner.state.lock();
        if state.stopped {
            return Err(SimError::ControllerStopped(self.inner.id));
        }
        let now = self.current_time(&state);
        if deadline.is_infinite() || deadline.is_before(now) {
            return Err(SimError::InvalidDeadline {
                model: self.inner.id,
                requested: deadline.to_string(),
                now: now.to_string(),
            });
        }
        let event = Event::new(deadline, self.inner.id, kind);
        trace!(model = %self.inner.id, event = %event.id, %deadline, kind = event.kind.label(), "enqueue");
        Ok(state.queue.push(event))
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    fn dispatch_callback(&self, name: &str, args: &[Value]) -> Result<(), SimError> {
        let callback = self
            .inner
            .registry
            .resolve(self.inner.id, name, args, CallbackShape::Event)?;
        let Callback::Event(f) = callback else {
            return Err(SimError::UnresolvedCallback {
                model: self.inner.id,
                name: name.to_string(),
                kinds: describe_kinds(args),
            });
        };

        self.inner.state.lock().dispatching = true;
        let ctx = EventContext::new(self.clone());
        let result = {
            let mut model = self.inner.model.lock();
            f(&mut *model, &ctx, args)
        };
        self.inner.state.lock().dispatching = false;
        result
    }

    fn fire_timeout(&self, wait_id: WaitId) -> Result<bool, SimError> {
        let wait = {
            let mut state = self.inner.state.lock();
            let Some(wait) = state.waits.remove(&wait_id) else {
                warn!(model = %self.inner.id, wait = %wait_id, "timeout for unknown wait");
                return Ok(false);
            };
            wait.set_timed_out()?;
            state.remove_from_condition(&wait);
            wait
        };
        debug!(
            model = %self.inner.id,
            process = %wait.process(),
            condition = wait.condition().unwrap_or_default(),
            "wait timed out"
        );
        self.wake_up_thread(&wait)?;
        Ok(true)
    }

    fn fire_wakeup(&self, wait_id: WaitId) -> Result<bool, SimError> {
        let wait = self.inner.state.lock().waits.remove(&wait_id);
        let Some(wait) = wait else {
            warn!(model = %self.inner.id, wait = %wait_id, "wakeup for unknown wait");
            return Ok(false);
        };
        self.wake_up_thread(&wait)?;
        Ok(true)
    }

    /// Hands the event's outcome to the waiter and queues its wakeup at `now`.
    fn deliver(
        &self,
        state: &mut LocalState<U>,
        wait: &WaitRequest,
        message: &str,
        now: VirtualTime<U>,
    ) -> Result<(), SimError> {
        wait.set_result(message)?;
        if let Some(timeout) = wait.timeout_event() {
            state.queue.cancel(timeout);
        }
        state.now = now;
        state
            .queue
            .push(Event::new(now, self.inner.id, EventKind::Wakeup { wait: wait.id() }));
        debug!(
            model = %self.inner.id,
            process = %wait.process(),
            condition = wait.condition().unwrap_or_default(),
            %now,
            "wait released"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Process threads
    // ------------------------------------------------------------------------

    fn run_process(&self, process: ProcessId, parker: Parker, body: &ProcessFn<M, U>, args: &[Value]) {
        debug!(model = %self.inner.id, %process, "process started");
        let ctx = ProcessContext::new(self.clone(), process, parker);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&ctx, args)));

        let stopped = {
            let mut state = self.inner.state.lock();
            state.set_process_state(process, ProcessState::Finished);
            state.stopped
        };
        if stopped {
            return;
        }

        let signal = match outcome {
            Ok(Ok(())) => {
                debug!(model = %self.inner.id, %process, "process finished");
                Signal::EventComplete
            }
            Ok(Err(err)) => {
                error!(model = %self.inner.id, %process, error = %err, "process failed");
                Signal::Failed {
                    model: self.inner.id,
                    process,
                    error: err,
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(model = %self.inner.id, %process, %message, "process panicked");
                Signal::Panicked {
                    model: self.inner.id,
                    process,
                    message,
                }
            }
        };
        self.inner.link.resume_scheduler_thread(signal);
    }

    /// Gives control back to the scheduler and parks until woken.
    fn suspend(&self, process: ProcessId, parker: &Parker, signal: Signal) -> Result<Wake, SimError> {
        self.inner.link.resume_scheduler_thread(signal);
        match parker.park() {
            Wake::Abort => {
                warn!(model = %self.inner.id, %process, "wait interrupted");
                Err(SimError::Interrupted {
                    model: self.inner.id,
                    process,
                })
            }
            wake => Ok(wake),
        }
    }

    fn register_wait(
        &self,
        process: ProcessId,
        condition: Option<&str>,
        delay: Option<U>,
        wakeup: bool,
    ) -> Result<Arc<WaitRequest>, SimError> {
        let mut state = self.inner.state.lock();
        if state.stopped {
            return Err(SimError::ControllerStopped(self.inner.id));
        }
        let now = self.current_time(&state);
        let wait_id = state.allocate_wait();

        let mut timeout = None;
        if let Some(delay) = delay {
            let deadline = now.delayed(delay)?;
            let kind = if wakeup {
                EventKind::Wakeup { wait: wait_id }
            } else {
                EventKind::Timeout { wait: wait_id }
            };
            let id = state.queue.push(Event::new(deadline, self.inner.id, kind));
            if !wakeup {
                timeout = Some(id);
            }
        }

        let wait = Arc::new(WaitRequest::new(
            wait_id,
            self.inner.link.next_arrival(),
            process,
            condition.map(str::to_string),
            timeout,
        ));
        if let Some(condition) = condition {
            state
                .conditions
                .entry(condition.to_string())
                .or_default()
                .push_back(Arc::clone(&wait));
        }
        state.waits.insert(wait_id, Arc::clone(&wait));
        state.set_process_state(process, ProcessState::Waiting);
        trace!(model = %self.inner.id, %process, wait = %wait_id, ?condition, "wait registered");
        Ok(wait)
    }

    pub(crate) fn wait_for_delay(
        &self,
        process: ProcessId,
        parker: &Parker,
        delay: U,
    ) -> Result<(), SimError> {
        if delay.is_negative() {
            return Err(SimError::NegativeDelay(delay.to_string()));
        }
        let wait = self.register_wait(process, None, Some(delay), true)?;
        match self.suspend(process, parker, Signal::EventComplete)? {
            Wake::Resume => Ok(()),
            other => Err(SimError::ProtocolViolation(format!(
                "{process} woken with {other:?} while waiting on {}",
                wait.id()
            ))),
        }
    }

    pub(crate) fn wait_on_condition(
        &self,
        process: ProcessId,
        parker: &Parker,
        condition: &str,
        delay: Option<U>,
    ) -> Result<WaitOutcome, SimError> {
        let wait = self.register_wait(process, Some(condition), delay, false)?;
        match self.suspend(process, parker, Signal::EventComplete)? {
            Wake::Resume => wait.outcome().ok_or_else(|| {
                SimError::ProtocolViolation(format!("{} resumed without a result", wait.id()))
            }),
            other => Err(SimError::ProtocolViolation(format!(
                "{process} woken with {other:?} while waiting on {condition:?}"
            ))),
        }
    }

    /// Defers a release to the scheduler and parks until it has been made.
    pub(crate) fn release(
        &self,
        process: ProcessId,
        parker: &Parker,
        condition: &str,
        message: &str,
        scope: ReleaseScope,
    ) -> Result<usize, SimError> {
        if message == TIMED_OUT {
            return Err(SimError::IllegalWaitResult(message.to_string()));
        }
        let reply = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return Err(SimError::ControllerStopped(self.inner.id));
            }
            let Some(slot) = state.processes.get_mut(&process) else {
                return Err(SimError::ProtocolViolation(format!(
                    "{process} is not a live process of {}",
                    self.inner.id
                )));
            };
            slot.state = ProcessState::Releasing;
            slot.unparker.clone()
        };

        trace!(model = %self.inner.id, %process, condition, ?scope, "release deferred");
        self.inner.link.defer_release(PendingRelease {
            condition: condition.to_string(),
            message: message.to_string(),
            scope,
            model: self.inner.id,
            process,
            reply,
        });

        match self.suspend(process, parker, Signal::EventStopped)? {
            Wake::Released(count) => {
                self.inner
                    .state
                    .lock()
                    .set_process_state(process, ProcessState::Running);
                Ok(count)
            }
            other => Err(SimError::ProtocolViolation(format!(
                "{process} woken with {other:?} while releasing {condition:?}"
            ))),
        }
    }

    /// Joins threads of processes that already finished.
    fn reap_finished(&self) {
        let handles: Vec<_> = {
            let mut state = self.inner.state.lock();
            let finished: Vec<_> = state
                .processes
                .iter()
                .filter(|(_, slot)| slot.state == ProcessState::Finished)
                .map(|(id, _)| *id)
                .collect();
            finished
                .into_iter()
                .filter_map(|id| state.processes.remove(&id))
                .filter_map(|slot| slot.handle)
                .collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                warn!(model = %self.inner.id, "process thread ended with a panic");
            }
        }
    }
}

impl<M: Send + 'static, U: TimeDomain> SimulationControl<U> for SimulationController<M, U> {
    fn model_id(&self) -> ModelId {
        self.inner.id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn init(&self) -> Result<(), SimError> {
        {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return Err(SimError::ControllerStopped(self.inner.id));
            }
            if state.initialized {
                return Ok(());
            }
            state.initialized = true;
        }

        if let Some(hook) = &self.inner.init {
            self.inner.state.lock().dispatching = true;
            let ctx = EventContext::new(self.clone());
            let result = {
                let mut model = self.inner.model.lock();
                hook(&mut *model, &ctx)
            };
            self.inner.state.lock().dispatching = false;
            result?;
        }
        debug!(model = %self.inner.id, name = %self.inner.name, pending = self.pending_events(), "controller initialized");
        Ok(())
    }

    fn resume_next(&self, current: VirtualTime<U>) -> Result<bool, SimError> {
        let event = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return Err(SimError::ControllerStopped(self.inner.id));
            }
            let expected = state.queue.next_time();
            if expected != current || current.is_infinite() {
                error!(model = %self.inner.id, %expected, requested = %current, "scheduling mismatch");
                return Err(SimError::SchedulingMismatch {
                    model: self.inner.id,
                    expected: expected.to_string(),
                    requested: current.to_string(),
                });
            }
            state.now = current;
            state.queue.pop().ok_or_else(|| {
                SimError::ProtocolViolation(format!("{} lost its next event", self.inner.id))
            })?
        };

        debug!(
            model = %self.inner.id,
            event = %event.id,
            time = %current,
            kind = event.kind.label(),
            "dispatch"
        );
        match event.kind {
            EventKind::Callback { name, args } => {
                self.dispatch_callback(&name, &args)?;
                Ok(false)
            }
            kind @ EventKind::Process { .. } => {
                self.start_process(Event { kind, ..event })?;
                Ok(true)
            }
            EventKind::Timeout { wait } => self.fire_timeout(wait),
            EventKind::Wakeup { wait } => self.fire_wakeup(wait),
        }
    }

    fn next_schedule_time(&self) -> VirtualTime<U> {
        self.inner.state.lock().queue.next_time()
    }

    fn next_event_id(&self) -> Option<EventId> {
        self.inner.state.lock().queue.next_id()
    }

    fn quit(&self) {
        let slots: Vec<_> = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.queue.clear();
            state.conditions.clear();
            state.waits.clear();
            state.processes.drain().map(|(_, slot)| slot).collect()
        };

        debug!(model = %self.inner.id, processes = slots.len(), "controller stopping");
        for slot in &slots {
            slot.unparker.unpark(Wake::Abort);
        }
        let current = thread::current().id();
        for handle in slots.into_iter().filter_map(|slot| slot.handle) {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!(model = %self.inner.id, "process thread ended with a panic");
            }
        }
    }
}

impl<M: Send + 'static, U: TimeDomain> ProcessControl<U> for SimulationController<M, U> {
    fn wake_up_thread(&self, wait: &WaitRequest) -> Result<(), SimError> {
        let mut state = self.inner.state.lock();
        let Some(slot) = state.processes.get_mut(&wait.process()) else {
            return Err(SimError::ProtocolViolation(format!(
                "{} has no live process {} for {}",
                self.inner.id,
                wait.process(),
                wait.id()
            )));
        };
        slot.state = ProcessState::Running;
        slot.unparker.unpark(Wake::Resume);
        debug!(model = %self.inner.id, process = %wait.process(), wait = %wait.id(), "process resumed");
        Ok(())
    }

    fn start_process(&self, event: Event<U>) -> Result<(), SimError> {
        let EventKind::Process { name, args } = event.kind else {
            return Err(SimError::ProtocolViolation(format!(
                "{} is not a process event",
                event.id
            )));
        };
        let Callback::Process(body) =
            self.inner
                .registry
                .resolve(self.inner.id, &name, &args, CallbackShape::Process)?
        else {
            return Err(SimError::UnresolvedCallback {
                model: self.inner.id,
                name,
                kinds: describe_kinds(&args),
            });
        };

        self.reap_finished();
        let (unparker, parker) = wait::parker();
        let process = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return Err(SimError::ControllerStopped(self.inner.id));
            }
            let process = state.allocate_process();
            state.processes.insert(
                process,
                ProcessSlot {
                    unparker,
                    handle: None,
                    state: ProcessState::Running,
                },
            );
            state.processes_started += 1;
            process
        };

        let controller = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("meridian-{}-{process}-{name}", self.inner.id))
            .spawn(move || controller.run_process(process, parker, &body, &args));

        let mut state = self.inner.state.lock();
        match spawned {
            Ok(handle) => {
                if let Some(slot) = state.processes.get_mut(&process) {
                    slot.handle = Some(handle);
                }
                Ok(())
            }
            Err(err) => {
                state.processes.remove(&process);
                Err(SimError::Spawn(err))
            }
        }
    }

    fn resume_ready(&self) -> bool {
        let state = self.inner.state.lock();
        let now = self.current_time(&state);
        state.queue.peek().is_some_and(|event| {
            event.deadline == now
                && matches!(event.kind, EventKind::Timeout { .. } | EventKind::Wakeup { .. })
        })
    }

    fn oldest_wait_on(&self, condition: &str) -> Option<u64> {
        let state = self.inner.state.lock();
        if state.stopped {
            return None;
        }
        state
            .conditions
            .get(condition)
            .and_then(VecDeque::front)
            .map(|wait| wait.arrival())
    }

    fn try_release_one_on_condition(
        &self,
        condition: &str,
        message: &str,
    ) -> Result<ReleaseReport, SimError> {
        if message == TIMED_OUT {
            return Err(SimError::IllegalWaitResult(message.to_string()));
        }
        let mut state = self.inner.state.lock();
        if state.stopped {
            return Ok(ReleaseReport::default());
        }
        let now = self.current_time(&state);
        let Some(list) = state.conditions.get_mut(condition) else {
            return Ok(ReleaseReport::default());
        };
        let Some(wait) = list.pop_front() else {
            return Ok(ReleaseReport::default());
        };
        let remaining = list.len();
        if remaining == 0 {
            state.conditions.remove(condition);
        }
        self.deliver(&mut state, &wait, message, now)?;
        Ok(ReleaseReport {
            released: 1,
            remaining,
        })
    }

    fn proceed_release_all_on_condition(
        &self,
        condition: &str,
        message: &str,
    ) -> Result<ReleaseReport, SimError> {
        if message == TIMED_OUT {
            return Err(SimError::IllegalWaitResult(message.to_string()));
        }
        let mut state = self.inner.state.lock();
        if state.stopped {
            return Ok(ReleaseReport::default());
        }
        let now = self.current_time(&state);
        let Some(waits) = state.conditions.remove(condition) else {
            return Ok(ReleaseReport::default());
        };
        let released = waits.len();
        for wait in &waits {
            self.deliver(&mut state, wait, message, now)?;
        }
        Ok(ReleaseReport {
            released,
            remaining: 0,
        })
    }

    fn processes_started(&self) -> u64 {
        self.inner.state.lock().processes_started
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
