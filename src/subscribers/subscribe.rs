//! # Observer trait
//!
//! `Subscribe` is the extension point for watching what a registry does. Each
//! observer is driven by a dedicated worker fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! Observers are not channel handlers: they never receive published arguments,
//! only [`Event`]s describing table mutations and dispatch outcomes.
//!
//! ## Contract
//! - Implementations may be slow; they do **not** block publishers nor other observers.
//! - Each observer **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. On overflow, events for that observer are **dropped**.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use dispatchbus::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct Failures(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Failures {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind.is_failure() {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failures" }
//!     fn queue_capacity(&self) -> usize { 64 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for registry observers.
///
/// Called from an observer-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs and overflow/panic events).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this observer's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
