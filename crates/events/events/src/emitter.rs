//! The eventful capability and its composition helpers.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::config::RegistryConfig;
use crate::error::EventResult;
use crate::handler::{Callback, Context, Payload};
use crate::registry::EventRegistry;

/// Trait for types whose instances publish named events.
///
/// Implementors only expose their [`EventRegistry`]; subscription and
/// dispatch come for free. Use `#[derive(Eventful)]` to delegate to a field,
/// or wrap any existing type in [`Evented`].
pub trait Eventful {
    /// Returns the registry owned by this instance.
    fn event_registry(&self) -> &EventRegistry;

    /// Subscribes `callback` to `event_name` with an optional receiver.
    fn on(&self, event_name: &str, callback: Callback, context: Option<Context>) {
        self.event_registry().on(event_name, callback, context);
    }

    /// Subscribes `callback` for a single invocation.
    fn once(&self, event_name: &str, callback: Callback, context: Option<Context>) {
        self.event_registry().once(event_name, callback, context);
    }

    /// Removes the first entry matching `callback` and `context` by identity.
    fn off(&self, event_name: &str, callback: &Callback, context: Option<&Context>) {
        self.event_registry().off(event_name, callback, context);
    }

    /// Synchronously dispatches `event_name` to its listeners.
    fn emit(&self, event_name: &str, payload: impl Into<Payload>) -> EventResult<()>
    where
        Self: Sized,
    {
        self.emit_value(event_name, payload.into())
    }

    /// Same as [`emit`](Self::emit) with an already built payload; callable
    /// on `dyn Eventful`.
    fn emit_value(&self, event_name: &str, payload: Payload) -> EventResult<()> {
        self.event_registry().emit(event_name, payload)
    }
}

/// Provenance check for the eventful capability.
///
/// Both methods default to "not eventful". Only types that actually own an
/// [`EventRegistry`] (through [`Evented`], `#[derive(Eventful)]`, or a manual
/// [`Eventful`] impl) override them, so a type exposing its own `on`/`off`/
/// `emit` methods still tests negative.
pub trait AsEventful {
    /// Whether every instance of this type composes an event registry.
    fn composes_events() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Returns this value as an [`Eventful`] if it composes the capability.
    fn as_eventful(&self) -> Option<&dyn Eventful> {
        None
    }
}

/// Returns whether `value` composes the eventful capability.
pub fn is_eventful<T: AsEventful + ?Sized>(value: &T) -> bool {
    value.as_eventful().is_some()
}

impl Eventful for EventRegistry {
    fn event_registry(&self) -> &EventRegistry {
        self
    }
}

impl AsEventful for EventRegistry {
    fn composes_events() -> bool {
        true
    }

    fn as_eventful(&self) -> Option<&dyn Eventful> {
        Some(self)
    }
}

/// Adds an event registry to any base type.
///
/// The wrapper dereferences to the base, so a `Evented<Vec<T>>` still behaves
/// like a vector while also publishing events.
///
/// ```rust,ignore
/// let mut list = Evented::new(Vec::new());
/// list.on("pushed", listener(|p| println!("{p}")), None);
/// list.push(1);
/// list.emit("pushed", 1)?;
/// ```
pub struct Evented<B> {
    base: B,
    events: EventRegistry,
}

impl<B> Evented<B> {
    /// Wraps `base` with an empty registry.
    pub fn new(base: B) -> Self {
        Self {
            base,
            events: EventRegistry::new(),
        }
    }

    /// Wraps `base` with a registry using custom config.
    pub fn with_config(base: B, config: RegistryConfig) -> Self {
        Self {
            base,
            events: EventRegistry::with_config(config),
        }
    }

    /// Returns the wrapped base value.
    pub fn base(&self) -> &B {
        &self.base
    }

    /// Returns the wrapped base value mutably.
    pub fn base_mut(&mut self) -> &mut B {
        &mut self.base
    }

    /// Unwraps the base value, dropping every subscription.
    pub fn into_inner(self) -> B {
        self.base
    }
}

impl<B: Default> Default for Evented<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B> From<B> for Evented<B> {
    fn from(base: B) -> Self {
        Self::new(base)
    }
}

impl<B> Deref for Evented<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.base
    }
}

impl<B> DerefMut for Evented<B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.base
    }
}

impl<B> Eventful for Evented<B> {
    fn event_registry(&self) -> &EventRegistry {
        &self.events
    }
}

impl<B> AsEventful for Evented<B> {
    fn composes_events() -> bool {
        true
    }

    fn as_eventful(&self) -> Option<&dyn Eventful> {
        Some(self)
    }
}

impl<B: fmt::Debug> fmt::Debug for Evented<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evented")
            .field("base", &self.base)
            .field("events", &self.events)
            .finish()
    }
}
