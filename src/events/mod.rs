//! Registry events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! observe what the registry does: table mutations, dispatch outcomes and
//! failures inside async publishes or observer workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Registry` (every operation), `publish_async` tasks,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the observer listener spawned by `RegistryBuilder::build`
//!   (fans out to `SubscriberSet`), and receivers from `Registry::events()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
