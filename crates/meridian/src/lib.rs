//! # Meridian
//!
//! Distributed discrete-event simulation on one shared virtual timeline.
//!
//! Models are written independently, each against its own controller, and
//! a single super-scheduler keeps all of them globally time-consistent:
//!
//! - **Event-driven models** schedule instant callbacks on themselves
//! - **Process-driven models** run long-lived logical threads that wait on
//!   delays or on named conditions released by other processes
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Meridian                          │
//! │  ┌──────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │  config  │ → │SuperScheduler│ → │ controllers (1   │  │
//! │  │  (toml)  │   │ (global time)│   │ per model)       │  │
//! │  └──────────┘   └──────────────┘   └──────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use meridian::prelude::*;
//!
//! let mut scheduler = meridian::scheduler_from_project(".")?;
//! let dock = scheduler.register(
//!     ModelBuilder::new("dock", ())
//!         .on_process("ship", Signature::none(), |ctx, _| {
//!             let outcome = ctx.wait_on_condition_for_delay("berth", 30)?;
//!             ctx.wait_for_delay(if outcome.is_timed_out() { 60 } else { 10 })
//!         })
//!         .build(),
//! )?;
//! dock.schedule_process_myself("ship", vec![], VirtualTime::zero())?;
//! let summary = scheduler.run()?;
//! ```
//!
//! # Crates
//!
//! - [`meridian_types`]: virtual time, time units, identifiers
//! - [`meridian_config`]: layered configuration
//! - [`meridian_sim`]: controllers, super-scheduler, scheduling API

mod error;
mod launch;

pub use error::{MeridianError, Result};
pub use launch::{
    scheduler_from_config, scheduler_from_loader, scheduler_from_project, scheduler_from_toml,
};

// Re-export configuration
pub use meridian_config::{
    ConfigError, ConfigLoader, MeridianConfig, Paths, SchedulerSettings, SimulationSettings,
};

// Re-export core types
pub use meridian_types::{
    EventId, ExecutionMode, ModelId, ProcessId, Ticks, TimeDomain, TimeError, TimeUnit,
    VirtualTime, WaitId,
};

// Re-export the simulation kernel
pub use meridian_sim::{
    Callback, CallbackRegistry, CallbackShape, ControllerPhase, Event, EventContext, EventKind,
    EventQueue, EventScheduling, Model, ModelBuilder, ProcessContext, ProcessControl,
    ProcessScheduling, ReleaseReport, RunSummary, SchedulerConfig, Signature, SimError,
    SimulationControl, SimulationController, Step, StopReason, SuperScheduler, TIMED_OUT, Value,
    ValueKind, WaitOutcome, WaitRequest, WaitResult,
};

/// Everything a model author needs, in one import.
pub mod prelude {
    pub use meridian_sim::{
        EventScheduling, ModelBuilder, ProcessScheduling, SchedulerConfig, Signature, SimError,
        SuperScheduler, Value, ValueKind, WaitOutcome,
    };
    pub use meridian_types::{Ticks, VirtualTime};
}
