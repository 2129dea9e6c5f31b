//! # Eventful Events
//!
//! Core event capability for Eventful providing:
//! - A per-instance registry of `(callback, context)` subscriptions
//! - Synchronous, snapshot-based dispatch that tolerates reentrant `on`/`off`
//! - Composition of the capability onto any type, with a provenance check
//! - Reactive properties that defer an event on every write
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventful_events::{listener, Evented, Eventful};
//!
//! let list = Evented::new(Vec::<u32>::new());
//!
//! // Subscribe to events
//! let on_added = listener(|payload| println!("added: {payload}"));
//! list.on("added", on_added.clone(), None);
//!
//! // Emit events
//! list.emit("added", 42)?;
//!
//! // Unsubscribe by identity
//! list.off("added", &on_added, None);
//! ```

mod config;
mod emitter;
mod error;
mod handler;
mod registry;
pub mod reactive;
pub mod scheduler;

pub use config::RegistryConfig;
pub use emitter::{is_eventful, AsEventful, Evented, Eventful};
pub use error::{EventError, EventResult, ListenerError, ListenerResult};
pub use handler::{callback, context, listener, Callback, Context, Payload};
pub use reactive::{Property, PropertyShape, ReactiveEmit, Slot};
pub use registry::EventRegistry;
pub use scheduler::{run_microtasks, LocalScheduler, MicrotaskQueue, Scheduler};
