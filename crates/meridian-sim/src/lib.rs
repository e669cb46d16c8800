//! # meridian-sim: Distributed discrete-event simulation kernel
//!
//! Independently written models advance along one shared virtual timeline.
//! Each model schedules events on itself; process-mode models also run
//! long-lived logical threads that block on delays or named conditions. A
//! single [`SuperScheduler`] keeps every model in one globally consistent
//! time order.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SuperScheduler                         │
//! │   global time · min deadline across controllers · releases   │
//! └──────────────┬──────────────────────────────┬────────────────┘
//!                │ resume_next(t)               │ signals
//!                ▼                              │
//! ┌──────────────────────────────┐   ┌──────────┴───────────────┐
//! │ SimulationController (M0)    │   │ process threads (1 per   │
//! │  EventQueue · conditions     │◄──┤ process, parked between  │
//! │  callback registry · model   │   │ waits)                   │
//! └──────────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! ## Ordering
//!
//! - Events are dispatched by deadline, then by [`EventId`]. Ids come from a
//!   single process-wide counter, so same-time events run in creation order,
//!   across controllers too.
//! - Condition releases issued by processes are deferred until every other
//!   event of the current time step has been dispatched.
//!
//! ## Quick Start
//!
//! ```ignore
//! use meridian_sim::{ModelBuilder, SchedulerConfig, Signature, SuperScheduler, VirtualTime};
//!
//! let mut scheduler = SuperScheduler::new(SchedulerConfig::synchronous());
//! let model = ModelBuilder::new("clock", 0u64)
//!     .on_event("tick", Signature::none(), |ticks, ctx, _| {
//!         *ticks += 1;
//!         ctx.schedule_event_in("tick", vec![], 10)?;
//!         Ok(())
//!     })
//!     .build();
//! let clock = scheduler.register(model)?;
//! clock.schedule_event_myself("tick", vec![], VirtualTime::zero())?;
//! let summary = scheduler.run()?;
//! ```
//!
//! [`EventId`]: meridian_types::EventId

mod api;
mod control;
mod controller;
mod dispatch;
mod error;
mod event;
mod model;
mod scheduler;
mod value;
mod wait;

pub use api::{EventContext, EventScheduling, ProcessContext, ProcessScheduling};
pub use control::{ProcessControl, ReleaseReport, SimulationControl};
pub use controller::{ControllerPhase, SimulationController};
pub use dispatch::{Callback, CallbackRegistry, CallbackShape, EventFn, InitFn, ProcessFn};
pub use error::SimError;
pub use event::{Event, EventKind, EventQueue};
pub use model::{Model, ModelBuilder};
pub use scheduler::{RunSummary, SchedulerConfig, Step, StopReason, SuperScheduler};
pub use value::{Signature, Value, ValueKind};
pub use wait::{WaitOutcome, WaitRequest, WaitResult, TIMED_OUT};

pub use meridian_types::{
    EventId, ExecutionMode, ModelId, ProcessId, Ticks, TimeDomain, VirtualTime, WaitId,
};
