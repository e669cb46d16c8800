//! Per-model callback registry.
//!
//! Callbacks are registered by name once, when the model is built. Several
//! callbacks may share a name; resolution picks the first one whose
//! [`Signature`] accepts the arguments exactly, then the first loose one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use meridian_types::{ModelId, Ticks, TimeDomain};
use tracing::warn;

use crate::api::{EventContext, ProcessContext};
use crate::value::{describe_kinds, Signature, Value};
use crate::SimError;

/// Instant callback: runs to completion on the scheduler thread.
pub type EventFn<M, U> =
    Arc<dyn Fn(&mut M, &EventContext<M, U>, &[Value]) -> Result<(), SimError> + Send + Sync>;

/// Process body: runs on its own logical thread and may wait.
pub type ProcessFn<M, U> =
    Arc<dyn Fn(&ProcessContext<M, U>, &[Value]) -> Result<(), SimError> + Send + Sync>;

/// Hook run once by the controller's `init`.
pub type InitFn<M, U> =
    Arc<dyn Fn(&mut M, &EventContext<M, U>) -> Result<(), SimError> + Send + Sync>;

/// Which scheduling call a callback is looked up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackShape {
    Event,
    Process,
}

impl fmt::Display for CallbackShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackShape::Event => f.write_str("instant event"),
            CallbackShape::Process => f.write_str("process"),
        }
    }
}

pub enum Callback<M, U: TimeDomain = Ticks> {
    Event(EventFn<M, U>),
    Process(ProcessFn<M, U>),
}

impl<M, U: TimeDomain> Callback<M, U> {
    pub fn event<F>(f: F) -> Self
    where
        F: Fn(&mut M, &EventContext<M, U>, &[Value]) -> Result<(), SimError> + Send + Sync + 'static,
    {
        Callback::Event(Arc::new(f))
    }

    pub fn process<F>(f: F) -> Self
    where
        F: Fn(&ProcessContext<M, U>, &[Value]) -> Result<(), SimError> + Send + Sync + 'static,
    {
        Callback::Process(Arc::new(f))
    }

    fn shape(&self) -> CallbackShape {
        match self {
            Callback::Event(_) => CallbackShape::Event,
            Callback::Process(_) => CallbackShape::Process,
        }
    }
}

impl<M, U: TimeDomain> Clone for Callback<M, U> {
    fn clone(&self) -> Self {
        match self {
            Callback::Event(f) => Callback::Event(Arc::clone(f)),
            Callback::Process(f) => Callback::Process(Arc::clone(f)),
        }
    }
}

struct Registered<M, U: TimeDomain> {
    signature: Signature,
    callback: Callback<M, U>,
}

/// Name → overloads.
pub struct CallbackRegistry<M, U: TimeDomain = Ticks> {
    entries: HashMap<String, Vec<Registered<M, U>>>,
}

impl<M, U: TimeDomain> CallbackRegistry<M, U> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, signature: Signature, callback: Callback<M, U>) {
        self.entries
            .entry(name.into())
            .or_default()
            .push(Registered {
                signature,
                callback,
            });
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn find(&self, name: &str, args: &[Value], shape: CallbackShape) -> Option<&Registered<M, U>> {
        let overloads = self.entries.get(name)?;
        let candidates = || overloads.iter().filter(|r| r.callback.shape() == shape);
        candidates()
            .find(|r| r.signature.matches_exactly(args))
            .or_else(|| candidates().find(|r| r.signature.matches_loosely(args)))
    }

    /// Checks, at scheduling time, that an event can be built for `name`.
    pub fn validate(
        &self,
        model: ModelId,
        name: &str,
        args: &[Value],
        shape: CallbackShape,
    ) -> Result<(), SimError> {
        let Some(overloads) = self.entries.get(name) else {
            warn!(%model, name, "unknown callback");
            return Err(SimError::UnknownCallback {
                model,
                name: name.to_string(),
            });
        };

        if !overloads.iter().any(|r| r.callback.shape() == shape) {
            warn!(%model, name, %shape, "callback has the wrong kind");
            return Err(SimError::IllegalCallback {
                model,
                name: name.to_string(),
                reason: format!("not registered as a {shape}"),
            });
        }

        if self.find(name, args, shape).is_none() {
            warn!(%model, name, kinds = %describe_kinds(args), "no overload accepts the arguments");
            return Err(SimError::IllegalCallback {
                model,
                name: name.to_string(),
                reason: format!("no overload accepts arguments {}", describe_kinds(args)),
            });
        }

        Ok(())
    }

    /// Looks the callback up at dispatch time.
    pub fn resolve(
        &self,
        model: ModelId,
        name: &str,
        args: &[Value],
        shape: CallbackShape,
    ) -> Result<Callback<M, U>, SimError> {
        self.find(name, args, shape)
            .map(|r| r.callback.clone())
            .ok_or_else(|| SimError::UnresolvedCallback {
                model,
                name: name.to_string(),
                kinds: describe_kinds(args),
            })
    }
}

impl<M, U: TimeDomain> Default for CallbackRegistry<M, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, U: TimeDomain> fmt::Debug for CallbackRegistry<M, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("names", &self.names())
            .finish()
    }
}
