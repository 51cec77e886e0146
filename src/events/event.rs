//! # Observability events emitted by the registry.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Table events**: entries added or removed (subscribe, unsubscribe, one-shot consumption)
//! - **Dispatch events**: outcome of a publish (delivered, no handler, failure, panic)
//! - **Observer events**: problems inside the observer fan-out itself
//!
//! The [`Event`] struct carries the channel, a reason for failures and the
//! number of published arguments.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Events from concurrent publishes interleave; use `seq` to restore emission order.
//!
//! ## Example
//! ```rust
//! use dispatchbus::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::HandlerFailed)
//!     .with_channel("orders")
//!     .with_reason("boom")
//!     .with_args(2);
//!
//! assert_eq!(ev.kind, EventKind::HandlerFailed);
//! assert_eq!(ev.channel.as_deref(), Some("orders"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of registry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Table events ===
    /// Entry registered (or replaced).
    ///
    /// Sets:
    /// - `channel`: channel name
    /// - `once`: whether the entry is one-shot
    Subscribed,

    /// Entry removed by an explicit unsubscribe.
    ///
    /// Sets:
    /// - `channel`: channel name
    Unsubscribed,

    /// One-shot entry removed after its invocation.
    ///
    /// Sets:
    /// - `channel`: channel name
    OneShotConsumed,

    // === Dispatch events ===
    /// Handler ran and returned successfully.
    ///
    /// Sets:
    /// - `channel`: channel name
    /// - `args`: number of published arguments
    Delivered,

    /// Publish on a channel with no entry (silent no-op for the caller).
    ///
    /// Sets:
    /// - `channel`: channel name
    /// - `args`: number of published arguments
    NoHandler,

    /// Handler returned an error, or the arguments did not fit it.
    ///
    /// Sets:
    /// - `channel`: channel name
    /// - `args`: number of published arguments
    /// - `reason`: error message
    HandlerFailed,

    /// Handler panicked.
    ///
    /// Sets:
    /// - `channel`: channel name
    /// - `reason`: panic message
    HandlerPanicked,

    /// A publish scheduled by `publish_async` failed inside its task.
    ///
    /// Sets:
    /// - `channel`: channel name
    /// - `reason`: error or panic message
    AsyncPublishFailed,

    // === Observer events ===
    /// Observer panicked during event processing.
    ///
    /// Sets:
    /// - `channel`: observer name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Observer dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `channel`: observer name
    /// - `reason`: "full" or "closed"
    SubscriberOverflow,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Subscribed => "subscribed",
            EventKind::Unsubscribed => "unsubscribed",
            EventKind::OneShotConsumed => "one_shot_consumed",
            EventKind::Delivered => "delivered",
            EventKind::NoHandler => "no_handler",
            EventKind::HandlerFailed => "handler_failed",
            EventKind::HandlerPanicked => "handler_panicked",
            EventKind::AsyncPublishFailed => "async_publish_failed",
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
        }
    }

    /// Returns `true` for kinds that describe a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EventKind::HandlerFailed
                | EventKind::HandlerPanicked
                | EventKind::AsyncPublishFailed
                | EventKind::SubscriberPanicked
                | EventKind::SubscriberOverflow
        )
    }
}

/// Registry event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Channel (or observer) name, if applicable.
    pub channel: Option<Arc<str>>,
    /// Human-readable reason (errors, panic messages, overflow details).
    pub reason: Option<Arc<str>>,
    /// Number of published arguments.
    pub args: Option<u32>,
    /// One-shot flag of the entry involved.
    pub once: Option<bool>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            channel: None,
            reason: None,
            args: None,
            once: None,
        }
    }

    /// Attaches a channel name.
    #[inline]
    pub fn with_channel(mut self, channel: impl Into<Arc<str>>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the published argument count.
    #[inline]
    pub fn with_args(mut self, n: usize) -> Self {
        self.args = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches the one-shot flag.
    #[inline]
    pub fn with_once(mut self, once: bool) -> Self {
        self.once = Some(once);
        self
    }

    /// Creates an observer overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_channel(subscriber)
            .with_reason(reason)
    }

    /// Creates an observer panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_channel(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
