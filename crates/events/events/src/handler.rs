//! Listener callback types.

use std::any::Any;
use std::rc::Rc;

use serde_json::Value;

use crate::error::ListenerResult;

/// Value bound as a listener's receiver.
pub type Context = Rc<dyn Any>;

/// Value passed to listeners when an event fires.
pub type Payload = Value;

/// A listener callback.
///
/// Callbacks are compared by allocation, so keep the `Rc` returned by
/// [`callback`] around if you intend to unsubscribe it later.
pub type Callback = Rc<dyn Fn(Option<&Context>, &Payload) -> ListenerResult>;

/// Wraps a closure into a [`Callback`].
pub fn callback(f: impl Fn(Option<&Context>, &Payload) -> ListenerResult + 'static) -> Callback {
    Rc::new(f)
}

/// Wraps an infallible closure that ignores its receiver into a [`Callback`].
pub fn listener(f: impl Fn(&Payload) + 'static) -> Callback {
    Rc::new(move |_, payload| {
        f(payload);
        Ok(())
    })
}

/// Wraps a value into a [`Context`].
pub fn context<T: Any>(value: T) -> Context {
    Rc::new(value)
}

/// A registered `(callback, context)` pair.
#[derive(Clone)]
pub(crate) struct Subscription {
    callback: Callback,
    context: Option<Context>,
    once: bool,
}

impl Subscription {
    pub(crate) fn new(callback: Callback, context: Option<Context>) -> Self {
        Self {
            callback,
            context,
            once: false,
        }
    }

    pub(crate) fn once(callback: Callback, context: Option<Context>) -> Self {
        Self {
            callback,
            context,
            once: true,
        }
    }

    pub(crate) fn is_once(&self) -> bool {
        self.once
    }

    pub(crate) fn same_entry(&self, other: &Subscription) -> bool {
        self.once == other.once && self.matches(&other.callback, other.context.as_ref())
    }

    /// Identity match on both the callback and the context.
    pub(crate) fn matches(&self, callback: &Callback, context: Option<&Context>) -> bool {
        same_allocation(&self.callback, callback)
            && match (self.context.as_ref(), context) {
                (None, None) => true,
                (Some(a), Some(b)) => same_allocation(a, b),
                _ => false,
            }
    }

    pub(crate) fn call(&self, payload: &Payload) -> ListenerResult {
        (self.callback)(self.context.as_ref(), payload)
    }
}

// Compares data pointers only; vtable pointers of the same closure may differ
// across codegen units.
fn same_allocation<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
