//! Per-instance subscription table and synchronous dispatch.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::config::RegistryConfig;
use crate::error::{EventError, EventResult};
use crate::handler::{Callback, Context, Payload, Subscription};

type Subscriptions = HashMap<String, Vec<Subscription>>;

/// Maps event names to their ordered `(callback, context)` entries.
///
/// All methods take `&self`, so listeners may call `on`/`off`/`emit` on the
/// same registry while it is dispatching. The table is only borrowed while it
/// is being read or written, never while a listener runs.
///
/// The map itself is allocated on the first subscription and released again
/// when the last entry is removed.
pub struct EventRegistry {
    subscriptions: RefCell<Option<Subscriptions>>,
    config: RegistryConfig,
    /// Event names already warned about for going over `max_listeners`.
    over_limit: RefCell<HashSet<String>>,
}

impl EventRegistry {
    /// Creates an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates an empty registry with custom config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            subscriptions: RefCell::new(None),
            config,
            over_limit: RefCell::new(HashSet::new()),
        }
    }

    /// Returns the registry config.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribes `callback` to `event_name`, invoked with `context` as receiver.
    ///
    /// Entries are not deduplicated: subscribing the same pair twice yields
    /// two entries that fire and unsubscribe independently.
    pub fn on(&self, event_name: &str, callback: Callback, context: Option<Context>) {
        self.insert(event_name, Subscription::new(callback, context));
    }

    /// Like [`on`](Self::on), but the entry removes itself right before its
    /// first invocation.
    pub fn once(&self, event_name: &str, callback: Callback, context: Option<Context>) {
        self.insert(event_name, Subscription::once(callback, context));
    }

    /// Subscribes a type-erased value, which must hold a [`Callback`].
    ///
    /// Fails with [`EventError::InvalidArgument`] without touching any state
    /// when the value is anything else.
    pub fn try_on(
        &self,
        event_name: &str,
        candidate: Rc<dyn Any>,
        context: Option<Context>,
    ) -> EventResult<()> {
        let callback = candidate.downcast::<Callback>().map_err(|_| {
            EventError::InvalidArgument(format!(
                "listener for '{event_name}' is not an invocable callback"
            ))
        })?;
        self.on(event_name, Callback::clone(&callback), context);
        Ok(())
    }

    /// Removes the first entry whose callback and context are the same
    /// allocations as the ones given.
    ///
    /// Does nothing when no such entry exists.
    pub fn off(&self, event_name: &str, callback: &Callback, context: Option<&Context>) {
        let removed = self.remove_first(event_name, |sub| sub.matches(callback, context));
        if removed {
            tracing::trace!(event = event_name, "Listener removed");
        }
    }

    /// Removes every entry for `event_name`.
    pub fn off_all(&self, event_name: &str) {
        // Entries are dropped after the borrow ends; a context's `Drop` may
        // reach back into this registry.
        let removed = {
            let mut guard = self.subscriptions.borrow_mut();
            let Some(map) = guard.as_mut() else {
                return;
            };
            let removed = map.remove(event_name);
            if map.is_empty() && self.config.release_empty {
                *guard = None;
            }
            removed
        };
        self.over_limit.borrow_mut().remove(event_name);

        if let Some(entries) = removed {
            tracing::trace!(event = event_name, removed = entries.len(), "Listeners cleared");
            drop(entries);
        }
    }

    /// Removes every entry for every event.
    pub fn clear(&self) {
        let removed = {
            let mut guard = self.subscriptions.borrow_mut();
            if self.config.release_empty {
                guard.take()
            } else {
                guard.as_mut().map(std::mem::take)
            }
        };
        self.over_limit.borrow_mut().clear();
        drop(removed);
    }

    /// Invokes every listener of `event_name` in subscription order.
    ///
    /// Dispatch runs over the entries present when the call began: listeners
    /// added meanwhile wait for the next emit, listeners removed meanwhile
    /// still run (one-shot entries excepted). The first listener error stops
    /// dispatch and is returned; panics unwind through unchanged.
    pub fn emit(&self, event_name: &str, payload: impl Into<Payload>) -> EventResult<()> {
        let snapshot = match self.snapshot(event_name) {
            Some(entries) => entries,
            None => return Ok(()),
        };
        let payload = payload.into();

        tracing::trace!(event = event_name, listeners = snapshot.len(), "Dispatching event");

        for sub in &snapshot {
            // A one-shot entry already consumed by a nested emit, or removed
            // by an earlier listener, must not fire again.
            if sub.is_once() && !self.remove_first(event_name, |live| live.same_entry(sub)) {
                continue;
            }
            sub.call(&payload)
                .map_err(|err| EventError::listener_failed(event_name, err))?;
        }

        Ok(())
    }

    /// Number of entries subscribed to `event_name`.
    pub fn listener_count(&self, event_name: &str) -> usize {
        self.subscriptions
            .borrow()
            .as_ref()
            .and_then(|map| map.get(event_name))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Whether `event_name` has at least one entry.
    pub fn has_listeners(&self, event_name: &str) -> bool {
        self.listener_count(event_name) > 0
    }

    /// Names of events with at least one entry, in no particular order.
    pub fn event_names(&self) -> Vec<String> {
        self.subscriptions
            .borrow()
            .as_ref()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the subscription map is currently allocated.
    pub fn is_allocated(&self) -> bool {
        self.subscriptions.borrow().is_some()
    }

    fn insert(&self, event_name: &str, subscription: Subscription) {
        let count = {
            let mut guard = self.subscriptions.borrow_mut();
            let entries = guard
                .get_or_insert_with(HashMap::new)
                .entry(event_name.to_string())
                .or_default();
            entries.push(subscription);
            entries.len()
        };

        tracing::trace!(event = event_name, listeners = count, "Listener added");

        if let Some(max) = self.config.max_listeners {
            if count > max && self.over_limit.borrow_mut().insert(event_name.to_string()) {
                tracing::warn!(
                    event = event_name,
                    listeners = count,
                    max_listeners = max,
                    "Possible listener leak: listener limit exceeded"
                );
            }
        }
    }

    fn snapshot(&self, event_name: &str) -> Option<Vec<Subscription>> {
        self.subscriptions
            .borrow()
            .as_ref()
            .and_then(|map| map.get(event_name))
            .cloned()
    }

    // Returns whether an entry was removed. The entry is dropped here, after
    // the table borrow has ended.
    fn remove_first(&self, event_name: &str, predicate: impl Fn(&Subscription) -> bool) -> bool {
        let removed = self.take_first(event_name, predicate);
        removed.is_some()
    }

    fn take_first(
        &self,
        event_name: &str,
        predicate: impl Fn(&Subscription) -> bool,
    ) -> Option<Subscription> {
        let mut guard = self.subscriptions.borrow_mut();
        let map = guard.as_mut()?;
        let entries = map.get_mut(event_name)?;
        let index = entries.iter().position(|sub| predicate(sub))?;

        let removed = entries.remove(index);
        if entries.is_empty() {
            map.remove(event_name);
            self.over_limit.borrow_mut().remove(event_name);
        }
        if map.is_empty() && self.config.release_empty {
            *guard = None;
        }
        Some(removed)
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.subscriptions.borrow();
        let counts: Vec<(&str, usize)> = guard
            .as_ref()
            .map(|map| map.iter().map(|(k, v)| (k.as_str(), v.len())).collect())
            .unwrap_or_default();
        f.debug_struct("EventRegistry")
            .field("subscriptions", &counts)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{callback, context, listener};
    use serde_json::Value;
    use std::cell::{Cell, RefCell};

    fn counter() -> (Rc<Cell<u32>>, Callback) {
        let count = Rc::new(Cell::new(0));
        let cb = {
            let count = count.clone();
            listener(move |_| count.set(count.get() + 1))
        };
        (count, cb)
    }

    #[test]
    fn test_emit_counts_and_off() {
        let registry = EventRegistry::new();
        let (count, cb) = counter();

        registry.on("x", cb.clone(), None);
        for _ in 0..3 {
            registry.emit("x", ()).unwrap();
        }
        assert_eq!(count.get(), 3);

        registry.off("x", &cb, None);
        registry.emit("x", ()).unwrap();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_dispatch_order() {
        let registry = EventRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = log.clone();
            registry.on(
                "x",
                listener(move |p| log.borrow_mut().push(format!("{tag}:{p}"))),
                None,
            );
        }
        registry.emit("x", 1).unwrap();

        assert_eq!(*log.borrow(), vec!["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn test_contexts_are_bound_as_receiver() {
        let registry = EventRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let cb = {
            let seen = seen.clone();
            callback(move |ctx, payload| {
                let name = ctx
                    .and_then(|c| c.downcast_ref::<&str>())
                    .copied()
                    .unwrap_or("none");
                seen.borrow_mut().push((name.to_string(), payload.clone()));
                Ok(())
            })
        };

        registry.on("x", cb.clone(), Some(context("a")));
        registry.on("x", cb.clone(), Some(context("b")));
        registry.emit("x", "data").unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("a".to_string(), Value::from("data")));
        assert_eq!(seen[1], ("b".to_string(), Value::from("data")));
    }

    #[test]
    fn test_duplicate_entries_fire_independently() {
        let registry = EventRegistry::new();
        let (count, cb) = counter();

        registry.on("x", cb.clone(), None);
        registry.on("x", cb.clone(), None);
        registry.emit("x", ()).unwrap();
        assert_eq!(count.get(), 2);

        registry.off("x", &cb, None);
        registry.emit("x", ()).unwrap();
        assert_eq!(count.get(), 3);
        assert_eq!(registry.listener_count("x"), 1);
    }

    #[test]
    fn test_off_matches_context_identity() {
        let registry = EventRegistry::new();
        let (count, cb) = counter();
        let ctx = context(5u8);

        registry.on("x", cb.clone(), Some(ctx.clone()));
        registry.off("x", &cb, None);
        registry.off("x", &cb, Some(&context(5u8)));
        assert_eq!(registry.listener_count("x"), 1);

        registry.off("x", &cb, Some(&ctx));
        registry.emit("x", ()).unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_off_unknown_is_noop() {
        let registry = EventRegistry::new();
        let (_, cb) = counter();
        let (_, other) = counter();

        registry.off("missing", &cb, None);
        registry.on("x", cb.clone(), None);
        registry.off("x", &other, None);
        registry.off("y", &cb, None);
        assert_eq!(registry.listener_count("x"), 1);

        registry.off("x", &cb, None);
        registry.off("x", &cb, None);
        assert_eq!(registry.listener_count("x"), 0);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let registry = EventRegistry::new();
        assert!(registry.emit("x", ()).is_ok());

        let (_, cb) = counter();
        registry.on("y", cb, None);
        assert!(registry.emit("x", ()).is_ok());
    }

    #[test]
    fn test_map_is_released_when_empty() {
        let registry = EventRegistry::new();
        let (_, cb) = counter();
        assert!(!registry.is_allocated());

        registry.on("x", cb.clone(), None);
        registry.on("y", cb.clone(), None);
        assert!(registry.is_allocated());

        registry.off("x", &cb, None);
        assert_eq!(registry.event_names(), vec!["y".to_string()]);

        registry.off("y", &cb, None);
        assert!(!registry.is_allocated());
        assert!(registry.event_names().is_empty());
    }

    #[test]
    fn test_retain_empty_config() {
        let registry = EventRegistry::with_config(RegistryConfig::new().retain_empty());
        let (_, cb) = counter();

        registry.on("x", cb.clone(), None);
        registry.off("x", &cb, None);
        assert!(registry.is_allocated());
        assert!(registry.event_names().is_empty());
    }

    #[test]
    fn test_self_unsubscribe_during_emit() {
        let registry = Rc::new(EventRegistry::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let slot: Rc<RefCell<Option<Callback>>> = Rc::new(RefCell::new(None));

        let first = {
            let registry = Rc::downgrade(&registry);
            let slot = slot.clone();
            let log = log.clone();
            listener(move |_| {
                log.borrow_mut().push("first");
                if let (Some(registry), Some(me)) = (registry.upgrade(), slot.borrow().clone()) {
                    registry.off("x", &me, None);
                }
            })
        };
        *slot.borrow_mut() = Some(first.clone());

        let second = {
            let log = log.clone();
            listener(move |_| log.borrow_mut().push("second"))
        };

        registry.on("x", first, None);
        registry.on("x", second, None);

        registry.emit("x", ()).unwrap();
        registry.emit("x", ()).unwrap();

        assert_eq!(*log.borrow(), vec!["first", "second", "second"]);
    }

    #[test]
    fn test_removing_a_later_listener_mid_dispatch_does_not_fault() {
        let registry = Rc::new(EventRegistry::new());
        let (count, victim) = counter();

        let remover = {
            let registry = Rc::downgrade(&registry);
            let victim = victim.clone();
            listener(move |_| {
                if let Some(registry) = registry.upgrade() {
                    registry.off("x", &victim, None);
                }
            })
        };

        registry.on("x", remover, None);
        registry.on("x", victim, None);
        registry.emit("x", ()).unwrap();

        // Snapshotted before removal, so it still ran once.
        assert_eq!(count.get(), 1);
        assert_eq!(registry.listener_count("x"), 1);
    }

    #[test]
    fn test_listener_added_during_emit_waits_for_next_pass() {
        let registry = Rc::new(EventRegistry::new());
        let (count, late) = counter();

        let adder = {
            let registry = Rc::downgrade(&registry);
            listener(move |_| {
                if let Some(registry) = registry.upgrade() {
                    registry.on("x", late.clone(), None);
                }
            })
        };

        registry.on("x", adder, None);
        registry.emit("x", ()).unwrap();
        assert_eq!(count.get(), 0);

        registry.emit("x", ()).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_listener_error_aborts_dispatch() {
        let registry = EventRegistry::new();
        let (count, cb) = counter();

        registry.on("x", callback(|_, _| Err("boom".into())), None);
        registry.on("x", cb, None);

        let err = registry.emit("x", ()).unwrap_err();
        match err {
            EventError::ListenerFailed { event, message } => {
                assert_eq!(event, "x");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let registry = EventRegistry::new();
        let (count, cb) = counter();

        registry.once("x", cb, None);
        registry.emit("x", ()).unwrap();
        registry.emit("x", ()).unwrap();

        assert_eq!(count.get(), 1);
        assert!(!registry.is_allocated());
    }

    #[test]
    fn test_once_can_be_removed_before_firing() {
        let registry = EventRegistry::new();
        let (count, cb) = counter();

        registry.once("x", cb.clone(), None);
        registry.off("x", &cb, None);
        registry.emit("x", ()).unwrap();

        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_once_removed_by_earlier_listener_is_skipped() {
        let registry = Rc::new(EventRegistry::new());
        let (count, one_shot) = counter();

        let remover = {
            let registry = Rc::downgrade(&registry);
            let one_shot = one_shot.clone();
            listener(move |_| {
                if let Some(registry) = registry.upgrade() {
                    registry.off("x", &one_shot, None);
                }
            })
        };

        registry.on("x", remover, None);
        registry.once("x", one_shot, None);
        registry.emit("x", ()).unwrap();

        assert_eq!(count.get(), 0);
        assert_eq!(registry.listener_count("x"), 1);
    }

    #[test]
    fn test_once_consumed_by_nested_emit_is_skipped() {
        let registry = Rc::new(EventRegistry::new());
        let (count, one_shot) = counter();
        let depth = Rc::new(Cell::new(0));

        let reentrant = {
            let registry = Rc::downgrade(&registry);
            let depth = depth.clone();
            listener(move |_| {
                if depth.get() > 0 {
                    return;
                }
                depth.set(1);
                if let Some(registry) = registry.upgrade() {
                    registry.emit("x", ()).unwrap();
                }
                depth.set(0);
            })
        };

        registry.on("x", reentrant, None);
        registry.once("x", one_shot, None);
        registry.emit("x", ()).unwrap();

        // Fired by the nested pass only.
        assert_eq!(count.get(), 1);
        assert_eq!(registry.listener_count("x"), 1);
    }

    #[test]
    fn test_try_on_rejects_non_callbacks() {
        let registry = EventRegistry::new();

        let err = registry.try_on("x", Rc::new(42u32), None).unwrap_err();
        assert!(matches!(err, EventError::InvalidArgument(_)));
        assert!(!registry.is_allocated());

        let (count, cb) = counter();
        registry.try_on("x", Rc::new(cb), None).unwrap();
        registry.emit("x", ()).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_off_all_and_clear() {
        let registry = EventRegistry::new();
        let (count, cb) = counter();

        registry.on("x", cb.clone(), None);
        registry.on("x", cb.clone(), None);
        registry.on("y", cb.clone(), None);

        registry.off_all("x");
        registry.emit("x", ()).unwrap();
        assert_eq!(count.get(), 0);
        assert!(registry.has_listeners("y"));

        registry.clear();
        assert!(!registry.is_allocated());
    }

    /// Reads the registry back from its `Drop`.
    struct CountOnDrop {
        registry: std::rc::Weak<EventRegistry>,
        seen: Rc<Cell<Option<usize>>>,
    }

    impl Drop for CountOnDrop {
        fn drop(&mut self) {
            if let Some(registry) = self.registry.upgrade() {
                self.seen.set(Some(registry.listener_count("y")));
            }
        }
    }

    fn subscribe_counting_guard(registry: &Rc<EventRegistry>) -> Rc<Cell<Option<usize>>> {
        let seen = Rc::new(Cell::new(None));
        let ctx: Context = Rc::new(CountOnDrop {
            registry: Rc::downgrade(registry),
            seen: seen.clone(),
        });
        registry.on("x", listener(|_| {}), Some(ctx));
        seen
    }

    #[test]
    fn test_off_all_drops_entries_outside_borrow() {
        let registry = Rc::new(EventRegistry::new());
        let (_, cb) = counter();
        registry.on("y", cb, None);
        let seen = subscribe_counting_guard(&registry);

        registry.off_all("x");

        assert_eq!(seen.get(), Some(1));
        assert!(!registry.has_listeners("x"));
    }

    #[test]
    fn test_clear_drops_entries_outside_borrow() {
        for config in [RegistryConfig::new(), RegistryConfig::new().retain_empty()] {
            let registry = Rc::new(EventRegistry::with_config(config));
            let seen = subscribe_counting_guard(&registry);

            registry.clear();

            assert_eq!(seen.get(), Some(0));
            assert!(registry.event_names().is_empty());
        }
    }

    #[test]
    fn test_max_listeners_is_advisory() {
        let registry = EventRegistry::with_config(RegistryConfig::new().with_max_listeners(1));
        let (count, cb) = counter();

        registry.on("x", cb.clone(), None);
        registry.on("x", cb.clone(), None);
        registry.on("x", cb, None);
        registry.emit("x", ()).unwrap();

        assert_eq!(count.get(), 3);
    }
}
