//! # dispatchbus
//!
//! **dispatchbus** is an in-process channel dispatcher for Rust.
//!
//! Callers register a single handler per named channel; publishers invoke that
//! handler synchronously ([`Registry::publish`]) or on an independent task
//! ([`Registry::publish_async`]) with positional arguments, and can wait for all
//! scheduled async publishes with [`Registry::wait_async`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   subscribe(ch, h)     subscribe_once(ch, h)     unsubscribe(ch)
//!          │                     │                        │
//!          ▼                     ▼                        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Registry                                                         │
//! │  - Table  (channel → { Handler, once })  guarded by one lock      │
//! │  - InFlight (outstanding async publishes, join barrier)           │
//! │  - Bus    (observability events)                                  │
//! └──────┬──────────────────────────┬───────────────────────┬─────────┘
//!        ▼                          ▼                       │
//!   publish(ch, args)       publish_async(ch, args)         │ Event
//!   (caller's thread)       (blocking pool / thread)        ▼
//!        │                          │              ┌────────────────┐
//!        └──► Handler::call(args) ◄─┘              │  SubscriberSet │
//!                                                  └───┬────────┬───┘
//!                                                      ▼        ▼
//!                                                  observer1  observerN
//! ```
//!
//! ### Publish
//! ```text
//! publish(ch, args)
//!   ├─► no entry for ch          ─► Ok(()) (silent no-op)
//!   ├─► handler.call(args)
//!   │       ├─ Ok                ─► Delivered
//!   │       ├─ argument mismatch ─► Err(BusError::Invocation)
//!   │       ├─ handler error     ─► Err(BusError::Handler)
//!   │       └─ panic             ─► resumed on the caller
//!   └─► one-shot entry removed (whatever the outcome)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                       |
//! |-------------------|--------------------------------------------------------------|------------------------------------------|
//! | **Registry**      | One handler per channel, sync/async publish, join barrier.   | [`Registry`], [`RegistryBuilder`]        |
//! | **Handlers**      | Typed closures adapted to type-erased handlers.              | [`Handler`], [`IntoHandler`], [`Args`]   |
//! | **Policies**      | Whether handlers run under the registry lock.                | [`DispatchMode`]                         |
//! | **Observers**     | Hook into registry events (logging, metrics).                | [`Subscribe`], [`Event`]                 |
//! | **Errors**        | Typed errors for registry operations and invocation.         | [`BusError`], [`ArgError`]               |
//! | **Configuration** | Centralize registry settings.                                | [`RegistryConfig`]                       |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], an observer writing events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use dispatchbus::{Registry, RegistryConfig, args};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), dispatchbus::BusError> {
//!     let bus = Registry::new(RegistryConfig::default());
//!
//!     let total = Arc::new(AtomicUsize::new(0));
//!     let sink = Arc::clone(&total);
//!     bus.subscribe("add", move |n: usize, _label: &'static str| {
//!         sink.fetch_add(n, Ordering::SeqCst);
//!     })?;
//!
//!     bus.publish("add", args![2_usize, "sync"])?;
//!     for _ in 0..3 {
//!         bus.publish_async("add", args![1_usize, "async"]);
//!     }
//!     bus.wait_async().await;
//!     assert_eq!(total.load(Ordering::SeqCst), 5);
//!
//!     // Nobody listening is not an error.
//!     bus.publish("nobody", args![])?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod handlers;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use core::{Registry, RegistryBuilder, RegistryConfig};
pub use error::{ArgError, BusError, HandlerError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{Args, CallError, Erased, FromArg, Handler, HandlerOutput, IntoHandler, Value};
pub use policies::DispatchMode;
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a built-in `tracing` observer.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
