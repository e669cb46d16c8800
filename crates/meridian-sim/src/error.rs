//! Error types for the simulation kernel.
//!
//! Every variant except [`SimError::Interrupted`] means the model and the
//! scheduler have diverged: the run is terminated, never retried.

use meridian_config::ConfigError;
use meridian_types::{ModelId, ProcessId, TimeError, WaitId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// `resume_next` was asked to run a time that is not the controller's
    /// earliest pending deadline.
    #[error(
        "scheduling mismatch on {model}: next pending event is at {expected}, resume requested at {requested}"
    )]
    SchedulingMismatch {
        model: ModelId,
        expected: String,
        requested: String,
    },

    #[error("unknown callback {name:?} on {model}")]
    UnknownCallback { model: ModelId, name: String },

    #[error("illegal callback {name:?} on {model}: {reason}")]
    IllegalCallback {
        model: ModelId,
        name: String,
        reason: String,
    },

    /// No registered overload accepts the event's arguments at dispatch time.
    #[error("unresolved callback {name:?} on {model} for argument kinds {kinds}")]
    UnresolvedCallback {
        model: ModelId,
        name: String,
        kinds: String,
    },

    /// A releaser tried to deliver the reserved timed-out sentinel.
    #[error("illegal wait result: {0:?} is reserved for timeouts")]
    IllegalWaitResult(String),

    #[error("wait request {0} already has a result")]
    WaitAlreadyResolved(WaitId),

    /// The parking primitive was interrupted. The only recoverable error.
    #[error("wait of {process} on {model} was interrupted")]
    Interrupted { model: ModelId, process: ProcessId },

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid deadline {requested} on {model} (local time is {now})")]
    InvalidDeadline {
        model: ModelId,
        requested: String,
        now: String,
    },

    #[error("negative delay {0} is not allowed here")]
    NegativeDelay(String),

    #[error("controller {0} has been stopped")]
    ControllerStopped(ModelId),

    #[error("process mode is disabled in synchronous execution ({0})")]
    ProcessModeDisabled(ModelId),

    #[error("scheduler protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("process {process} on {model} failed: {source}")]
    ProcessFailed {
        model: ModelId,
        process: ProcessId,
        #[source]
        source: Box<SimError>,
    },

    #[error("process {process} on {model} panicked: {message}")]
    ProcessPanicked {
        model: ModelId,
        process: ProcessId,
        message: String,
    },

    #[error("failed to spawn process thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Raised by model code from inside a callback.
    #[error("model callback failed: {0}")]
    Callback(String),
}

impl SimError {
    /// Convenience constructor for model code.
    pub fn callback(message: impl Into<String>) -> Self {
        SimError::Callback(message.into())
    }

    /// Only an interrupted wait may be handled by the waiting process.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SimError::Interrupted { .. })
    }
}
