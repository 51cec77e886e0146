//! Dispatch policies.
//!
//! ## Contents
//! - [`DispatchMode`] whether handlers run under the registry lock
//!
//! ## Quick wiring
//! ```text
//! RegistryConfig { dispatch: DispatchMode, .. }
//!      └─► core::registry::Registry::publish picks the locked or detached path
//! ```
//!
//! ## Defaults
//! - `DispatchMode::Locked` (handlers are fully serialized with registry mutations).

mod dispatch;

pub use dispatch::DispatchMode;
