//! Properties that emit an event whenever they are written.
//!
//! A [`ReactiveEmit`] decoration turns a [`PropertyShape`] (a stored field
//! or an accessor pair) into a [`Property`]. Every successful write through
//! the property defers `emit(event, property_name)` on the owning instance.
//! The payload is the property's name; listeners re-read the value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::emitter::AsEventful;
use crate::error::{EventError, EventResult};
use crate::scheduler::{MicrotaskQueue, Scheduler};

/// Hidden per-instance backing store for a stored reactive field.
///
/// The first read yields the declared initial value and marks the slot as
/// initialized; later reads yield whatever was last written.
pub struct Slot<T> {
    initial: T,
    current: RefCell<Option<T>>,
}

impl<T: Clone> Slot<T> {
    /// Creates a slot holding `initial` until its first write.
    pub fn new(initial: T) -> Self {
        Self {
            initial,
            current: RefCell::new(None),
        }
    }

    /// Reads the current value.
    pub fn get(&self) -> T {
        let mut current = self.current.borrow_mut();
        match current.as_ref() {
            Some(value) => value.clone(),
            None => {
                *current = Some(self.initial.clone());
                self.initial.clone()
            }
        }
    }

    /// Stores `value` without emitting anything.
    pub fn set(&self, value: T) {
        *self.current.borrow_mut() = Some(value);
    }

    /// Whether the slot has been read or written at least once.
    pub fn is_initialized(&self) -> bool {
        self.current.borrow().is_some()
    }
}

impl<T: Clone + Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("initial", &self.initial)
            .field("current", &self.current.borrow())
            .finish()
    }
}

/// Reads a property from its owner.
pub type Getter<O, T> = Rc<dyn Fn(&O) -> T>;

/// Writes a property on its owner.
pub type Setter<O, T> = Rc<dyn Fn(&O, T)>;

/// How a property is declared before decoration.
pub enum PropertyShape<O, T> {
    /// A stored value living in a [`Slot`] on the owner.
    Field {
        /// Locates the slot on an instance.
        slot: fn(&O) -> &Slot<T>,
        /// Whether writes are allowed at all.
        writable: bool,
    },
    /// A getter with an optional setter.
    Accessor {
        /// Reads the value.
        get: Getter<O, T>,
        /// Writes the value, if the property is writable.
        set: Option<Setter<O, T>>,
    },
}

impl<O, T> PropertyShape<O, T> {
    /// A writable stored field.
    pub fn field(slot: fn(&O) -> &Slot<T>) -> Self {
        PropertyShape::Field {
            slot,
            writable: true,
        }
    }

    /// A stored field that rejects writes.
    pub fn read_only_field(slot: fn(&O) -> &Slot<T>) -> Self {
        PropertyShape::Field {
            slot,
            writable: false,
        }
    }

    /// A getter/setter pair.
    pub fn accessor(
        get: impl Fn(&O) -> T + 'static,
        set: impl Fn(&O, T) + 'static,
    ) -> Self {
        PropertyShape::Accessor {
            get: Rc::new(get),
            set: Some(Rc::new(set)),
        }
    }

    /// A getter with no setter.
    pub fn getter(get: impl Fn(&O) -> T + 'static) -> Self {
        PropertyShape::Accessor {
            get: Rc::new(get),
            set: None,
        }
    }

    fn is_writable(&self) -> bool {
        match self {
            PropertyShape::Field { writable, .. } => *writable,
            PropertyShape::Accessor { set, .. } => set.is_some(),
        }
    }
}

/// Decoration that makes properties emit `event` when written.
#[derive(Clone)]
pub struct ReactiveEmit {
    event: Rc<str>,
    scheduler: Rc<dyn Scheduler>,
}

impl ReactiveEmit {
    /// Creates a decoration emitting `event`, deferred on this thread's
    /// [`MicrotaskQueue`].
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: Rc::from(event.into()),
            scheduler: MicrotaskQueue::current(),
        }
    }

    /// Defers emissions on `scheduler` instead of the default queue.
    pub fn with_scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// The event name emitted on writes.
    pub fn event_name(&self) -> &str {
        &self.event
    }

    /// Applies the decoration to `property` of type `O`.
    ///
    /// Fails with [`EventError::PreconditionViolation`] if `O` does not
    /// compose an event registry. A property that cannot be written (a
    /// read-only field or a getter without setter) is returned untouched,
    /// with a warning.
    pub fn decorate<O, T>(
        &self,
        property: &str,
        shape: PropertyShape<O, T>,
    ) -> EventResult<Property<O, T>>
    where
        O: AsEventful + 'static,
        T: Clone + 'static,
    {
        if !O::composes_events() {
            return Err(EventError::PreconditionViolation(format!(
                "reactive property '{}' requires {} to be eventful",
                property,
                std::any::type_name::<O>()
            )));
        }

        let emitter = if shape.is_writable() {
            Some(self.clone())
        } else {
            tracing::warn!(
                property,
                event = %self.event,
                "Property is not writable, leaving it untouched"
            );
            None
        };

        Ok(Property {
            name: Rc::from(property),
            shape,
            emitter,
        })
    }

    /// Defers `emit(event, property)` on `owner`.
    ///
    /// Used by the accessors `#[derive(Reactive)]` generates; [`Property`]
    /// calls it on every write.
    pub fn schedule<O>(&self, owner: &Rc<O>, property: &str)
    where
        O: AsEventful + 'static,
    {
        let owner = Rc::clone(owner);
        let event = Rc::clone(&self.event);
        let property = property.to_string();
        self.scheduler.defer(Box::new(move || {
            emit_change(&*owner, &event, property);
        }));
    }
}

impl fmt::Debug for ReactiveEmit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEmit")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

// A deferred emission has no caller to report to, so failures are logged.
fn emit_change<O: AsEventful>(owner: &O, event: &str, property: String) {
    let Some(target) = owner.as_eventful() else {
        return;
    };
    if let Err(err) = target.emit_value(event, Value::String(property)) {
        tracing::error!(event, error = %err, "Deferred property emission failed");
    }
}

/// A decorated property bound to type `O`.
pub struct Property<O, T> {
    name: Rc<str>,
    shape: PropertyShape<O, T>,
    emitter: Option<ReactiveEmit>,
}

impl<O, T> Property<O, T>
where
    O: AsEventful + 'static,
    T: Clone + 'static,
{
    /// The property's name, used as the emission payload.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether writes emit an event.
    pub fn is_reactive(&self) -> bool {
        self.emitter.is_some()
    }

    /// Reads the property from `owner`.
    pub fn get(&self, owner: &O) -> T {
        match &self.shape {
            PropertyShape::Field { slot, .. } => slot(owner).get(),
            PropertyShape::Accessor { get, .. } => get(owner),
        }
    }

    /// Writes `value` to `owner` and defers the change event.
    ///
    /// The new value is readable immediately; the event fires once the
    /// scheduler gets to it.
    pub fn set(&self, owner: &Rc<O>, value: T) -> EventResult<()> {
        let target: &O = owner;
        match &self.shape {
            PropertyShape::Field {
                slot,
                writable: true,
            } => slot(target).set(value),
            PropertyShape::Accessor { set: Some(set), .. } => set(target, value),
            _ => return Err(EventError::ReadOnlyProperty(self.name.to_string())),
        }

        if let Some(emitter) = &self.emitter {
            emitter.schedule(owner, &self.name);
        }
        Ok(())
    }
}

impl<O, T> fmt::Debug for Property<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("reactive", &self.emitter.is_some())
            .finish()
    }
}
