//! Model construction.
//!
//! A model is its state plus a callback registry, built once with
//! [`ModelBuilder`] and handed to [`SuperScheduler::register`], which binds
//! it to a controller.
//!
//! ```ignore
//! let teller = ModelBuilder::new("teller", Counter::default())
//!     .on_event("arrive", Signature::exact([ValueKind::Int]), |counter, ctx, args| {
//!         counter.arrivals += 1;
//!         Ok(())
//!     })
//!     .on_process("serve", Signature::none(), |ctx, _| {
//!         loop {
//!             ctx.wait_on_condition("customer")?;
//!             ctx.wait_for_delay(5)?;
//!         }
//!     })
//!     .build();
//! let controller = scheduler.register(teller)?;
//! ```
//!
//! [`SuperScheduler::register`]: crate::SuperScheduler::register

use std::fmt;
use std::sync::Arc;

use meridian_types::{Ticks, TimeDomain};

use crate::api::{EventContext, ProcessContext};
use crate::dispatch::{Callback, CallbackRegistry, InitFn};
use crate::value::{Signature, Value};
use crate::SimError;

/// A model ready to be registered.
pub struct Model<M, U: TimeDomain = Ticks> {
    pub(crate) name: String,
    pub(crate) state: M,
    pub(crate) registry: CallbackRegistry<M, U>,
    pub(crate) init: Option<InitFn<M, U>>,
}

impl<M, U: TimeDomain> Model<M, U> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &CallbackRegistry<M, U> {
        &self.registry
    }
}

impl<M, U: TimeDomain> fmt::Debug for Model<M, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("registry", &self.registry)
            .field("has_init", &self.init.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Model`].
pub struct ModelBuilder<M, U: TimeDomain = Ticks> {
    model: Model<M, U>,
}

impl<M: Send + 'static, U: TimeDomain> ModelBuilder<M, U> {
    pub fn new(name: impl Into<String>, state: M) -> Self {
        Self {
            model: Model {
                name: name.into(),
                state,
                registry: CallbackRegistry::new(),
                init: None,
            },
        }
    }

    /// Registers an instant callback. Names may be registered several times
    /// with different signatures.
    #[must_use]
    pub fn on_event<F>(mut self, name: impl Into<String>, signature: Signature, f: F) -> Self
    where
        F: Fn(&mut M, &EventContext<M, U>, &[Value]) -> Result<(), SimError>
            + Send
            + Sync
            + 'static,
    {
        self.model
            .registry
            .register(name, signature, Callback::event(f));
        self
    }

    /// Registers a process body.
    #[must_use]
    pub fn on_process<F>(mut self, name: impl Into<String>, signature: Signature, f: F) -> Self
    where
        F: Fn(&ProcessContext<M, U>, &[Value]) -> Result<(), SimError> + Send + Sync + 'static,
    {
        self.model
            .registry
            .register(name, signature, Callback::process(f));
        self
    }

    /// Sets the hook run by the controller's `init`, typically to schedule
    /// the first events.
    #[must_use]
    pub fn on_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut M, &EventContext<M, U>) -> Result<(), SimError> + Send + Sync + 'static,
    {
        self.model.init = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Model<M, U> {
        self.model
    }
}
