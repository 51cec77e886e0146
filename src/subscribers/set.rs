//! # Non-blocking event fan-out to registry observers.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [lane 1] ──► worker 1 ──► observer1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [lane 2] ──► worker 2 ──► observer2.on_event()
//!     └──► [lane N] ──► worker N ──► observerN.on_event()
//! ```
//!
//! ## Rules
//! - **Per-observer FIFO**: each observer sees events in emission order
//! - **No cross-observer ordering**
//! - **Overflow**: event dropped for that observer only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: a panicking observer is reported and keeps receiving events

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

/// Queue feeding one observer worker.
struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for registry observers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per observer on `rt`.
    ///
    /// Minimum queue capacity is 1 (enforced).
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus, rt: &Handle) -> Self {
        let mut lanes = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            lanes.push(Lane { name: sub.name(), tx });
            workers.push(rt.spawn(drive(sub, rx, bus.clone())));
        }
        Self { lanes, workers, bus }
    }

    /// Number of observers in the set.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Emits an event to all observers.
    ///
    /// Overflow events that themselves overflow are not re-published.
    pub fn emit(&self, event: Arc<Event>) {
        let reportable = !event.is_subscriber_overflow();

        for lane in &self.lanes {
            let reason = match lane.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            tracing::warn!(subscriber = lane.name, reason, "observer dropped event");
            if reportable {
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Closes every lane and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for w in self.workers {
            let _ = w.await;
        }
    }
}

/// Worker loop: runs until the lane is closed.
async fn drive(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let outcome = AssertUnwindSafe(sub.on_event(ev.as_ref())).catch_unwind().await;
        if let Err(payload) = outcome {
            let info = panic_message(payload.as_ref());
            tracing::error!(subscriber = sub.name(), panic = %info, "observer panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
