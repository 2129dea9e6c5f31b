//! # Eventful Macros
//!
//! This crate provides procedural macros for the Eventful system.
//!
//! ## Main Macros
//!
//! - `Eventful` - Derive macro composing the event capability into a struct
//! - `Reactive` - Derive macro generating accessors that emit on every write

use proc_macro::TokenStream;

mod event_macro;
mod reactive_macro;

/// Derive macro composing the event capability into a struct.
///
/// Exactly one field must be marked `#[eventful]`. It can hold an
/// `EventRegistry`, an `Evented<B>`, or any other `Eventful` type, so
/// capability-carrying types can be nested to any depth.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Eventful)]
/// pub struct Playlist {
///     #[eventful]
///     tracks: Evented<Vec<String>>,
///     title: String,
/// }
///
/// let playlist = Playlist { tracks: Evented::default(), title: "Mix".into() };
/// assert!(is_eventful(&playlist));
/// ```
#[proc_macro_derive(Eventful, attributes(eventful))]
pub fn derive_eventful(input: TokenStream) -> TokenStream {
    event_macro::derive_eventful_impl(input)
}

/// Derive macro for reactive properties.
///
/// Every `Slot<T>` field marked `#[reactive(event = "...")]` gets a getter
/// named after the field and a `set_<field>` setter. The setter stores the
/// value, then defers `emit(event, "<field>")` on the thread's microtask
/// queue. The struct must also be `Eventful`; this is checked at compile
/// time.
///
/// `#[reactive(event = "...", scheduler = path::to_fn)]` defers on the
/// scheduler returned by `fn() -> Rc<dyn Scheduler>` instead, e.g. a
/// `LocalScheduler` when the host runs a tokio `LocalSet`.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Eventful, Reactive)]
/// pub struct Settings {
///     #[eventful]
///     events: EventRegistry,
///     #[reactive(event = "changed")]
///     volume: Slot<u8>,
/// }
///
/// let settings = Rc::new(Settings { events: EventRegistry::new(), volume: Slot::new(5) });
/// settings.set_volume(7);
/// assert_eq!(settings.volume(), 7);
/// run_microtasks(); // "changed" fires with payload "volume"
/// ```
#[proc_macro_derive(Reactive, attributes(reactive))]
pub fn derive_reactive(input: TokenStream) -> TokenStream {
    reactive_macro::derive_reactive_impl(input)
}
