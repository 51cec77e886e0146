//! # Observers of registry activity.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] that
//! fans registry [`Event`](crate::events::Event)s out to observers.
//!
//! ## Architecture
//! ```text
//! Registry ── publish(Event) ──► Bus ──► observer listener ──► SubscriberSet::emit
//!                                                                  │
//!                                                    ┌─────────────┼─────────────┐
//!                                                    ▼             ▼             ▼
//!                                                LogWriter      Metrics        Custom
//! ```
//!
//! Observers are wired through [`RegistryBuilder::with_subscribers`](crate::RegistryBuilder::with_subscribers).

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
