//! # Eventful
//!
//! Named events for any Rust type, plus properties that announce their own
//! changes.
//!
//! Eventful lets an instance own a registry of `(callback, context)`
//! subscriptions and dispatch events to them synchronously, and lets fields
//! defer a change event every time they are written.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use eventful::prelude::*;
//!
//! #[derive(Eventful, Reactive)]
//! struct Counter {
//!     #[eventful]
//!     events: EventRegistry,
//!     #[reactive(event = "changed")]
//!     value: Slot<u32>,
//! }
//!
//! fn main() -> EventResult<()> {
//!     let counter = Rc::new(Counter { events: EventRegistry::new(), value: Slot::new(0) });
//!
//!     counter.on("changed", listener(|field| println!("{field} changed")), None);
//!     counter.set_value(1);
//!
//!     // Deferred change events fire once the queue is drained.
//!     run_microtasks();
//!     Ok(())
//! }
//! ```

// Re-export the event capability
pub use eventful_events::*;

// Re-export macros
pub use eventful_macros::{Eventful, Reactive};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use eventful_events::{
        callback, context, is_eventful, listener, run_microtasks, AsEventful, Callback, Context,
        EventError, EventRegistry, EventResult, Evented, Eventful, Payload, PropertyShape,
        ReactiveEmit, RegistryConfig, Slot,
    };
    pub use eventful_macros::{Eventful, Reactive};
}
