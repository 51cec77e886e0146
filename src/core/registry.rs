//! # Channel registry: one handler per channel, sync and async publish.
//!
//! The registry owns a table `channel → entry` guarded by a single lock, and a
//! join barrier counting publishes scheduled with [`Registry::publish_async`].
//!
//! ## Architecture
//! ```text
//! subscribe / subscribe_once ──► lock ──► table.insert (replaces any prior entry)
//! unsubscribe ─────────────────► lock ──► table.remove (NotFound if absent)
//!
//! publish (Locked):
//!   lock ──► select entry ──► handler.call(args) ──► remove if one-shot ──► unlock
//!
//! publish (Detached):
//!   lock ──► clone entry (take if one-shot) ──► unlock ──► handler.call(args)
//!
//! publish_async:
//!   InFlight::enter() ──► spawn_blocking / thread ──► publish ──► drop(guard)
//!
//! wait_async ──► resolves when InFlight reaches zero
//! ```
//!
//! ## Rules
//! - At most one entry per channel; a later subscribe silently replaces it.
//! - Publishing to a channel without an entry is a no-op, not an error.
//! - A selected one-shot entry is removed even when its handler fails or panics.
//! - Handler errors are returned from `publish`; handler panics are resumed on
//!   the caller after the lock is released and the one-shot entry removed.
//! - Failures inside `publish_async` tasks are logged and reported as
//!   [`EventKind::AsyncPublishFailed`]; they never reach the process.
//!
//! ## Locking
//! The lock is re-entrant: a handler running under [`DispatchMode::Locked`] may
//! call back into the same registry from its own thread. Other threads stay
//! blocked until the handler returns. While a one-shot entry is firing, nested
//! publishes on its channel see no entry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::core::config::RegistryConfig;
use crate::core::inflight::{InFlight, InFlightGuard};
use crate::error::BusError;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::{Args, CallError, Handler, IntoHandler, Value};
use crate::policies::DispatchMode;
use crate::subscribers::panic_message;

/// Registered handler plus its one-shot flag.
struct Entry {
    /// Distinguishes this registration from a later one on the same channel.
    id: u64,
    handler: Handler,
    once: bool,
    /// One-shot entry currently being invoked under the lock.
    firing: bool,
}

/// Entry copied out of the table for one invocation.
struct Selected {
    id: u64,
    handler: Handler,
    once: bool,
}

#[derive(Default)]
struct Table {
    entries: HashMap<String, Entry>,
    next_id: u64,
}

impl Table {
    /// Inserts or replaces; returns `true` if an entry was replaced.
    fn insert(&mut self, channel: String, handler: Handler, once: bool) -> bool {
        let id = self.next_id;
        self.next_id += 1;
        let entry = Entry {
            id,
            handler,
            once,
            firing: false,
        };
        self.entries.insert(channel, entry).is_some()
    }

    fn remove(&mut self, channel: &str) -> Option<Entry> {
        self.entries.remove(channel)
    }

    /// Locked path: picks the entry, marking one-shot entries as firing.
    fn select(&mut self, channel: &str) -> Option<Selected> {
        let entry = self.entries.get_mut(channel)?;
        if entry.firing {
            return None;
        }
        if entry.once {
            entry.firing = true;
        }
        Some(Selected {
            id: entry.id,
            handler: entry.handler.clone(),
            once: entry.once,
        })
    }

    /// Locked path: removes the fired one-shot entry unless it was replaced or removed meanwhile.
    fn finish(&mut self, channel: &str, id: u64) -> bool {
        match self.entries.get(channel) {
            Some(e) if e.id == id => self.entries.remove(channel).is_some(),
            _ => false,
        }
    }

    /// Detached path: clones persistent entries, takes one-shot entries out.
    fn take(&mut self, channel: &str) -> Option<Selected> {
        let entry = self.entries.get(channel)?;
        if entry.firing {
            return None;
        }
        if entry.once {
            return self.entries.remove(channel).map(|e| Selected {
                id: e.id,
                handler: e.handler,
                once: true,
            });
        }
        Some(Selected {
            id: entry.id,
            handler: entry.handler.clone(),
            once: false,
        })
    }
}

/// Where `publish_async` runs its work.
#[derive(Debug, Clone)]
pub(crate) enum Spawner {
    /// Blocking pool of a tokio runtime.
    Tokio(Handle),
    /// One OS thread per async publish (no runtime available).
    Thread,
}

impl Spawner {
    pub(crate) fn detect() -> Self {
        Handle::try_current().map_or(Spawner::Thread, Spawner::Tokio)
    }
}

/// One scheduled async publish.
///
/// Dropped without running (runtime gone, thread spawn failed), it reports an
/// [`EventKind::AsyncPublishFailed`] before its barrier guard is released.
struct AsyncPublish {
    registry: Arc<Registry>,
    channel: String,
    args: Option<Args>,
    _guard: InFlightGuard,
}

impl AsyncPublish {
    fn run(mut self) {
        if let Some(args) = self.args.take() {
            self.registry.publish_in_task(&self.channel, args);
        }
    }
}

impl Drop for AsyncPublish {
    fn drop(&mut self) {
        if self.args.is_some() {
            self.registry
                .async_failed(&self.channel, "async publish dropped before it ran".to_string());
        }
    }
}

/// Concurrency-safe table of channel handlers.
///
/// Shared as `Arc<Registry>`; [`publish_async`](Registry::publish_async) needs
/// the `Arc` to keep the registry alive inside the scheduled task.
pub struct Registry {
    table: ReentrantMutex<RefCell<Table>>,
    inflight: Arc<InFlight>,
    bus: Bus,
    mode: DispatchMode,
    spawner: Spawner,
    /// Stops the observer listener when the registry goes away.
    shutdown: CancellationToken,
}

impl Registry {
    /// Creates an empty registry without observers.
    ///
    /// Async publishes run on the current tokio runtime's blocking pool when
    /// called inside one, otherwise on dedicated threads.
    pub fn new(cfg: RegistryConfig) -> Arc<Self> {
        Arc::new(Self::new_internal(
            &cfg,
            Bus::new(cfg.bus_capacity_clamped()),
            Spawner::detect(),
            CancellationToken::new(),
        ))
    }

    /// Starts a [`RegistryBuilder`](crate::RegistryBuilder) for observers or an explicit runtime.
    pub fn builder(cfg: RegistryConfig) -> crate::RegistryBuilder {
        crate::RegistryBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: &RegistryConfig,
        bus: Bus,
        spawner: Spawner,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            table: ReentrantMutex::new(RefCell::new(Table::default())),
            inflight: InFlight::new(),
            bus,
            mode: cfg.dispatch,
            spawner,
            shutdown,
        }
    }

    // ---------------------------
    // Table mutation
    // ---------------------------

    /// Registers `handler` as the persistent handler of `channel`.
    ///
    /// Replaces any prior entry (and its one-shot flag).
    pub fn subscribe<M>(
        &self,
        channel: impl Into<String>,
        handler: impl IntoHandler<M>,
    ) -> Result<(), BusError> {
        self.register(channel.into(), handler.into_handler(), false);
        Ok(())
    }

    /// Registers `handler` for a single invocation of `channel`.
    pub fn subscribe_once<M>(
        &self,
        channel: impl Into<String>,
        handler: impl IntoHandler<M>,
    ) -> Result<(), BusError> {
        self.register(channel.into(), handler.into_handler(), true);
        Ok(())
    }

    /// Registers an opaque value as the persistent handler of `channel`.
    ///
    /// Fails with [`BusError::InvalidHandler`] unless `value` holds a [`Handler`];
    /// the table is left untouched on failure.
    pub fn subscribe_value(&self, channel: impl Into<String>, value: Value) -> Result<(), BusError> {
        let handler = Self::handler_from_value(value)?;
        self.register(channel.into(), handler, false);
        Ok(())
    }

    /// One-shot variant of [`subscribe_value`](Registry::subscribe_value).
    pub fn subscribe_once_value(
        &self,
        channel: impl Into<String>,
        value: Value,
    ) -> Result<(), BusError> {
        let handler = Self::handler_from_value(value)?;
        self.register(channel.into(), handler, true);
        Ok(())
    }

    /// Removes the entry of `channel`.
    ///
    /// Fails with [`BusError::NotFound`] if there is none.
    pub fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        let removed = {
            let guard = self.table.lock();
            let removed = guard.borrow_mut().remove(channel);
            removed
        };
        match removed {
            Some(entry) => {
                tracing::debug!(channel, once = entry.once, "handler unsubscribed");
                self.emit(|| Event::new(EventKind::Unsubscribed).with_channel(channel));
                Ok(())
            }
            None => Err(BusError::NotFound {
                channel: channel.to_string(),
            }),
        }
    }

    fn handler_from_value(value: Value) -> Result<Handler, BusError> {
        value.downcast::<Handler>().map_err(|v| BusError::InvalidHandler {
            found: v.type_name(),
        })
    }

    fn register(&self, channel: String, handler: Handler, once: bool) {
        let replaced = {
            let guard = self.table.lock();
            let replaced = guard.borrow_mut().insert(channel.clone(), handler, once);
            replaced
        };
        tracing::debug!(channel = %channel, once, replaced, "handler subscribed");
        self.emit(|| {
            Event::new(EventKind::Subscribed)
                .with_channel(channel.as_str())
                .with_once(once)
        });
    }

    // ---------------------------
    // Dispatch
    // ---------------------------

    /// Invokes the handler of `channel` with `args` on the calling thread.
    ///
    /// - No entry: returns `Ok(())` without side effects.
    /// - Handler error: [`BusError::Handler`]; argument mismatch: [`BusError::Invocation`].
    /// - Handler panic: resumed on the caller once the lock is released.
    ///
    /// A one-shot entry is removed whatever the outcome.
    pub fn publish(&self, channel: &str, args: Args) -> Result<(), BusError> {
        match self.mode {
            DispatchMode::Locked => self.publish_locked(channel, &args),
            DispatchMode::Detached => self.publish_detached(channel, &args),
        }
    }

    fn publish_locked(&self, channel: &str, args: &Args) -> Result<(), BusError> {
        let guard = self.table.lock();
        let selected = guard.borrow_mut().select(channel);
        let Some(sel) = selected else {
            drop(guard);
            self.no_handler(channel, args);
            return Ok(());
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sel.handler.call(args)));
        let consumed = sel.once && guard.borrow_mut().finish(channel, sel.id);
        drop(guard);

        self.settle(channel, args.len(), consumed, outcome)
    }

    fn publish_detached(&self, channel: &str, args: &Args) -> Result<(), BusError> {
        let selected = {
            let guard = self.table.lock();
            let selected = guard.borrow_mut().take(channel);
            selected
        };
        let Some(sel) = selected else {
            self.no_handler(channel, args);
            return Ok(());
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sel.handler.call(args)));
        self.settle(channel, args.len(), sel.once, outcome)
    }

    fn no_handler(&self, channel: &str, args: &Args) {
        tracing::trace!(channel, args = args.len(), "publish without handler");
        self.emit(|| {
            Event::new(EventKind::NoHandler)
                .with_channel(channel)
                .with_args(args.len())
        });
    }

    /// Reports the outcome of one invocation and converts it for the caller.
    fn settle(
        &self,
        channel: &str,
        nargs: usize,
        consumed: bool,
        outcome: std::thread::Result<Result<(), CallError>>,
    ) -> Result<(), BusError> {
        if consumed {
            tracing::debug!(channel, "one-shot handler consumed");
            self.emit(|| Event::new(EventKind::OneShotConsumed).with_channel(channel));
        }

        let err = match outcome {
            Ok(Ok(())) => {
                tracing::trace!(channel, args = nargs, "delivered");
                self.emit(|| {
                    Event::new(EventKind::Delivered)
                        .with_channel(channel)
                        .with_args(nargs)
                });
                return Ok(());
            }
            Ok(Err(CallError::Args(source))) => BusError::Invocation {
                channel: channel.to_string(),
                source,
            },
            Ok(Err(CallError::Failed(source))) => BusError::Handler {
                channel: channel.to_string(),
                source,
            },
            Err(payload) => {
                let info = panic_message(payload.as_ref());
                tracing::warn!(channel, panic = %info, "handler panicked");
                self.emit(|| {
                    Event::new(EventKind::HandlerPanicked)
                        .with_channel(channel)
                        .with_reason(info.as_str())
                });
                panic::resume_unwind(payload);
            }
        };

        tracing::warn!(channel, error = %err, label = err.as_label(), "handler failed");
        self.emit(|| {
            Event::new(EventKind::HandlerFailed)
                .with_channel(channel)
                .with_args(nargs)
                .with_reason(err.to_string())
        });
        Err(err)
    }

    /// Schedules `publish(channel, args)` on an independent task and returns immediately.
    ///
    /// The task is counted by the join barrier until it finishes, whatever the
    /// outcome. Failures are logged and broadcast as [`EventKind::AsyncPublishFailed`],
    /// including a task dropped before it ran (for example when the runtime the
    /// registry was built on has shut down).
    ///
    /// Inside a tokio runtime the work goes to its blocking pool. Without one,
    /// every call spawns its own OS thread, so a burst of `n` publishes costs `n`
    /// threads.
    pub fn publish_async(self: &Arc<Self>, channel: impl Into<String>, args: Args) {
        let job = AsyncPublish {
            registry: Arc::clone(self),
            channel: channel.into(),
            args: Some(args),
            _guard: self.inflight.enter(),
        };

        match &self.spawner {
            Spawner::Tokio(rt) => {
                rt.spawn_blocking(move || job.run());
            }
            Spawner::Thread => {
                let spawned = std::thread::Builder::new()
                    .name("dispatchbus-publish".into())
                    .spawn(move || job.run());
                if let Err(e) = spawned {
                    // The job was dropped with the failed spawn and reported itself.
                    tracing::error!(error = %e, "failed to spawn async publish thread");
                }
            }
        }
    }

    fn publish_in_task(&self, channel: &str, args: Args) {
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| self.publish(channel, args))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        self.async_failed(channel, reason);
    }

    fn async_failed(&self, channel: &str, reason: String) {
        tracing::error!(channel, error = %reason, "async publish failed");
        self.emit(|| {
            Event::new(EventKind::AsyncPublishFailed)
                .with_channel(channel)
                .with_reason(reason)
        });
    }

    /// Resolves once every async publish scheduled so far has finished.
    pub async fn wait_async(&self) {
        self.inflight.wait().await;
    }

    /// Blocking variant of [`wait_async`](Registry::wait_async) for synchronous callers.
    ///
    /// Must not be called from an async runtime worker. Calling it from a handler
    /// that was itself scheduled by `publish_async` deadlocks in either dispatch
    /// mode: that handler's own task is still counted. Under
    /// [`DispatchMode::Locked`], calling it from any handler while async publishes
    /// are pending deadlocks too.
    pub fn wait_async_blocking(&self) {
        self.inflight.wait_blocking();
    }

    // ---------------------------
    // Inspection
    // ---------------------------

    /// Returns `true` if `channel` has an entry.
    pub fn contains(&self, channel: &str) -> bool {
        self.table.lock().borrow().entries.contains_key(channel)
    }

    /// Returns the one-shot flag of `channel`'s entry, if any.
    pub fn is_once(&self, channel: &str) -> Option<bool> {
        self.table.lock().borrow().entries.get(channel).map(|e| e.once)
    }

    /// Returns sorted list of channels with an entry.
    pub fn channels(&self) -> Vec<String> {
        let guard = self.table.lock();
        let mut names: Vec<String> = guard.borrow().entries.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.table.lock().borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().borrow().entries.is_empty()
    }

    /// Number of async publishes not finished yet.
    pub fn in_flight(&self) -> usize {
        self.inflight.current()
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Receiver of registry events emitted from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    fn emit(&self, make: impl FnOnce() -> Event) {
        if self.bus.has_receivers() {
            self.bus.publish(make());
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::error::ArgError;
    use rand::Rng;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn locked() -> Arc<Registry> {
        Registry::new(RegistryConfig::default())
    }

    fn detached() -> Arc<Registry> {
        Registry::new(RegistryConfig::default().with_dispatch(DispatchMode::Detached))
    }

    fn counter(hits: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + use<> {
        let hits = Arc::clone(hits);
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_publish_unknown_channel_is_noop() {
        let reg = locked();
        assert!(reg.publish("nobody", args![1_i32]).is_ok());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_unsubscribe_unknown_channel_not_found() {
        let reg = locked();
        match reg.unsubscribe("nobody") {
            Err(BusError::NotFound { channel }) => assert_eq!(channel, "nobody"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_subscribe_replaces_prior_handler() {
        let reg = locked();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        reg.subscribe("c", counter(&first)).unwrap();
        reg.subscribe("c", counter(&second)).unwrap();
        reg.publish("c", args![]).unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_replacement_resets_once_flag() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        reg.subscribe_once("c", counter(&hits)).unwrap();
        assert_eq!(reg.is_once("c"), Some(true));
        reg.subscribe("c", counter(&hits)).unwrap();
        assert_eq!(reg.is_once("c"), Some(false));

        reg.publish("c", args![]).unwrap();
        reg.publish("c", args![]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(reg.contains("c"));
    }

    #[test]
    fn test_once_fires_exactly_once() {
        for reg in [locked(), detached()] {
            let hits = Arc::new(AtomicUsize::new(0));
            reg.subscribe_once("c", counter(&hits)).unwrap();

            reg.publish("c", args![]).unwrap();
            reg.publish("c", args![]).unwrap();

            assert_eq!(hits.load(Ordering::SeqCst), 1);
            assert!(!reg.contains("c"));
            assert!(matches!(reg.unsubscribe("c"), Err(BusError::NotFound { .. })));
        }
    }

    #[test]
    fn test_unsubscribe_then_publish_is_noop() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        reg.subscribe("c", counter(&hits)).unwrap();
        reg.unsubscribe("c").unwrap();
        reg.publish("c", args![]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(matches!(reg.unsubscribe("c"), Err(BusError::NotFound { .. })));
    }

    #[test]
    fn test_arguments_forwarded_in_order() {
        let reg = locked();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        reg.subscribe("c", move |n: i32, s: &'static str| {
            *sink.lock().unwrap() = Some((n, s));
        })
        .unwrap();

        reg.publish("c", args![1_i32, "x"]).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some((1, "x")));
    }

    #[test]
    fn test_channel_names_are_case_sensitive() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        reg.subscribe("Orders", counter(&hits)).unwrap();
        reg.publish("orders", args![]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(reg.channels(), vec!["Orders".to_string()]);
    }

    #[test]
    fn test_invalid_handler_rejected_and_prior_entry_kept() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        reg.subscribe("c", counter(&hits)).unwrap();

        match reg.subscribe_value("c", Value::new(42_u32)) {
            Err(BusError::InvalidHandler { found }) => assert_eq!(found, "u32"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            reg.subscribe_once_value("c", Value::new("not callable")),
            Err(BusError::InvalidHandler { .. })
        ));

        reg.publish("c", args![]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(reg.is_once("c"), Some(false));
    }

    #[test]
    fn test_subscribe_value_accepts_handler() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        reg.subscribe_once_value("c", Value::new(Handler::new(counter(&hits))))
            .unwrap();
        reg.publish("c", args![]).unwrap();
        reg.publish("c", args![]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_argument_mismatch_is_invocation_error() {
        let reg = locked();
        reg.subscribe("c", |_: i32, _: i32| ()).unwrap();

        match reg.publish("c", args![1_i32]) {
            Err(BusError::Invocation { channel, source }) => {
                assert_eq!(channel, "c");
                assert_eq!(source, ArgError::Arity { expected: 2, got: 1 });
            }
            other => panic!("unexpected: {other:?}"),
        }
        match reg.publish("c", args![1_i32, "two"]) {
            Err(BusError::Invocation { source, .. }) => {
                assert!(matches!(source, ArgError::Type { index: 1, .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(reg.contains("c"));
    }

    #[test]
    fn test_failing_once_handler_still_removed() {
        let reg = locked();
        reg.subscribe_once("c", || -> Result<(), String> { Err("boom".into()) })
            .unwrap();

        let err = reg.publish("c", args![]).unwrap_err();
        assert_eq!(err.as_label(), "bus_handler_failed");
        assert!(!reg.contains("c"));
    }

    #[test]
    fn test_panicking_once_handler_removed_and_lock_released() {
        for reg in [locked(), detached()] {
            reg.subscribe_once("c", || -> () { panic!("handler exploded") })
                .unwrap();

            let res = panic::catch_unwind(AssertUnwindSafe(|| reg.publish("c", args![])));
            assert!(res.is_err());
            assert!(!reg.contains("c"));

            // Registry is still usable from another thread.
            let other = Arc::clone(&reg);
            std::thread::spawn(move || {
                other.subscribe("d", || ()).unwrap();
                other.publish("d", args![]).unwrap();
            })
            .join()
            .unwrap();
            assert!(reg.contains("d"));
        }
    }

    #[test]
    fn test_locked_handler_can_reenter_registry() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&reg);
        let hits_inner = Arc::clone(&hits);
        reg.subscribe("outer", move || {
            inner.subscribe("inner", counter(&hits_inner)).unwrap();
            inner.publish("inner", args![]).unwrap();
            inner.unsubscribe("inner").unwrap();
            assert!(inner.contains("outer"));
        })
        .unwrap();

        reg.publish("outer", args![]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!reg.contains("inner"));
    }

    #[test]
    fn test_firing_once_entry_invisible_to_nested_publish() {
        for reg in [locked(), detached()] {
            let hits = Arc::new(AtomicUsize::new(0));
            let inner = Arc::clone(&reg);
            let h = Arc::clone(&hits);
            reg.subscribe_once("c", move || {
                h.fetch_add(1, Ordering::SeqCst);
                inner.publish("c", args![]).unwrap();
            })
            .unwrap();

            reg.publish("c", args![]).unwrap();
            assert_eq!(hits.load(Ordering::SeqCst), 1);
            assert!(!reg.contains("c"));
        }
    }

    #[test]
    fn test_once_handler_resubscribing_itself_survives() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&reg);
        let h = Arc::clone(&hits);
        reg.subscribe_once("c", move || {
            inner.subscribe("c", counter(&h)).unwrap();
        })
        .unwrap();

        reg.publish("c", args![]).unwrap();
        assert_eq!(reg.is_once("c"), Some(false));
        reg.publish("c", args![]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_locked_mode_serializes_handlers() {
        let reg = locked();
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));
        for ch in ["a", "b"] {
            let active = Arc::clone(&active);
            let overlap = Arc::clone(&overlap);
            reg.subscribe(ch, move || {
                if active.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(2));
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        let workers: Vec<_> = ["a", "b", "a", "b"]
            .into_iter()
            .map(|ch| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        reg.publish(ch, args![]).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wait_async_without_runtime_uses_threads() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        reg.subscribe("c", counter(&hits)).unwrap();

        for _ in 0..16 {
            reg.publish_async("c", args![]);
        }
        reg.wait_async_blocking();
        assert_eq!(hits.load(Ordering::SeqCst), 16);
        assert_eq!(reg.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_async_drains_all_publishes() {
        for reg in [locked(), detached()] {
            let total = Arc::new(AtomicUsize::new(0));
            let sink = Arc::clone(&total);
            reg.subscribe("add", move |n: usize| {
                sink.fetch_add(n, Ordering::SeqCst);
            })
            .unwrap();

            for _ in 0..100 {
                reg.publish_async("add", args![1_usize]);
            }
            reg.wait_async().await;
            assert_eq!(total.load(Ordering::SeqCst), 100);
            assert_eq!(reg.in_flight(), 0);
        }
    }

    #[tokio::test]
    async fn test_failing_async_publish_releases_barrier_and_reports() {
        let reg = locked();
        let mut events = reg.events();
        reg.subscribe("c", || -> () { panic!("async boom") }).unwrap();

        reg.publish_async("c", args![]);
        tokio::time::timeout(Duration::from_secs(5), reg.wait_async())
            .await
            .expect("barrier released after panic");

        let mut saw_failure = false;
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::AsyncPublishFailed {
                assert_eq!(ev.channel.as_deref(), Some("c"));
                assert_eq!(ev.reason.as_deref(), Some("async boom"));
                saw_failure = true;
            }
        }
        assert!(saw_failure);
        assert!(reg.contains("c"));
    }

    #[tokio::test]
    async fn test_async_publish_error_is_reported() {
        let reg = locked();
        let mut events = reg.events();
        reg.subscribe("c", || -> Result<(), String> { Err("nope".into()) })
            .unwrap();

        reg.publish_async("c", args![]);
        tokio::time::timeout(Duration::from_secs(5), reg.wait_async())
            .await
            .expect("barrier released after error");

        let failed: Vec<Event> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|ev| ev.kind == EventKind::AsyncPublishFailed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].channel.as_deref(), Some("c"));
        assert_eq!(failed[0].reason.as_deref(), Some("handler on `c` failed: nope"));
    }

    #[test]
    fn test_async_publish_after_runtime_shutdown_is_reported() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let reg = rt.block_on(async { Registry::new(RegistryConfig::default()) });
        drop(rt);

        let hits = Arc::new(AtomicUsize::new(0));
        reg.subscribe("c", counter(&hits)).unwrap();
        let mut events = reg.events();

        for _ in 0..3 {
            reg.publish_async("c", args![]);
        }
        reg.wait_async_blocking();
        assert_eq!(reg.in_flight(), 0);

        let failed: Vec<Event> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|ev| ev.kind == EventKind::AsyncPublishFailed)
            .collect();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(failed.len(), 3);
        assert!(failed
            .iter()
            .all(|ev| ev.reason.as_deref() == Some("async publish dropped before it ran")));
    }

    #[tokio::test]
    async fn test_events_describe_operations() {
        let reg = locked();
        let mut events = reg.events();

        reg.subscribe_once("c", |_: u8| ()).unwrap();
        reg.publish("missing", args![]).unwrap();
        reg.publish("c", args![7_u8]).unwrap();

        let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Subscribed,
                EventKind::NoHandler,
                EventKind::OneShotConsumed,
                EventKind::Delivered,
            ]
        );
    }

    #[test]
    fn test_concurrent_disjoint_channels_stress() {
        let reg = detached();
        let threads = 8;
        let rounds = 500;
        let hits = Arc::new(AtomicUsize::new(0));
        let expected = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..threads)
            .map(|t| {
                let reg = Arc::clone(&reg);
                let hits = Arc::clone(&hits);
                let expected = Arc::clone(&expected);
                std::thread::spawn(move || {
                    let mut rng = rand::rng();
                    let mut subscribed = [false; 4];
                    for _ in 0..rounds {
                        let slot = rng.random_range(0..subscribed.len());
                        let channel = format!("t{t}-c{slot}");
                        match rng.random_range(0..3) {
                            0 => {
                                reg.subscribe(channel, counter(&hits)).unwrap();
                                subscribed[slot] = true;
                            }
                            1 => {
                                let res = reg.unsubscribe(&channel);
                                assert_eq!(res.is_ok(), subscribed[slot]);
                                subscribed[slot] = false;
                            }
                            _ => {
                                if subscribed[slot] {
                                    expected.fetch_add(1, Ordering::SeqCst);
                                }
                                reg.publish(&channel, args![]).unwrap();
                            }
                        }
                        std::thread::yield_now();
                    }
                    subscribed
                })
            })
            .collect();

        let mut live = 0;
        for w in workers {
            live += w.join().unwrap().iter().filter(|s| **s).count();
        }
        assert_eq!(reg.len(), live);
        assert_eq!(hits.load(Ordering::SeqCst), expected.load(Ordering::SeqCst));
    }

    #[test]
    fn test_concurrent_stress_locked_mode() {
        let reg = locked();
        let hits = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..4)
            .map(|t| {
                let reg = Arc::clone(&reg);
                let hits = Arc::clone(&hits);
                std::thread::spawn(move || {
                    let mut rng = rand::rng();
                    let channel = format!("w{t}");
                    let mut published = 0;
                    for _ in 0..200 {
                        if rng.random_bool(0.5) {
                            reg.subscribe_once(channel.as_str(), counter(&hits)).unwrap();
                            reg.publish(&channel, args![]).unwrap();
                            published += 1;
                        } else {
                            let _ = reg.unsubscribe(&channel);
                        }
                    }
                    published
                })
            })
            .collect();

        let total: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(hits.load(Ordering::SeqCst), total);
        assert!(reg.is_empty());
    }
}
