//! Registry core: the channel table, dispatch and the async join barrier.
//!
//! The public API from this module is [`Registry`], its [`RegistryBuilder`]
//! and [`RegistryConfig`].
//!
//! Internal modules:
//! - [`registry`]: channel table, publish paths, async scheduling;
//! - [`inflight`]: join barrier counting outstanding async publishes;
//! - [`builder`]: wiring of bus, observers and spawner;
//! - [`config`]: registry settings.

mod builder;
mod config;
mod inflight;
mod registry;

pub use builder::RegistryBuilder;
pub use config::RegistryConfig;
pub use registry::Registry;
