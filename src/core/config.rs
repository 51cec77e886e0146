//! # Registry configuration.
//!
//! Provides [`RegistryConfig`], the settings consumed by
//! [`RegistryBuilder`](crate::RegistryBuilder) and [`Registry::new`](crate::Registry::new).
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by [`RegistryConfig::bus_capacity_clamped`]

use crate::policies::DispatchMode;

/// Configuration for a [`Registry`](crate::Registry).
///
/// ## Field semantics
/// - `bus_capacity`: observability event ring buffer size (min 1; clamped)
/// - `dispatch`: whether handlers run under the registry lock
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Capacity of the observability broadcast channel.
    ///
    /// Observers lagging more than `bus_capacity` events skip the oldest ones.
    pub bus_capacity: usize,

    /// How `publish` holds the registry lock while a handler runs.
    pub dispatch: DispatchMode,
}

impl RegistryConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a copy with the given dispatch mode.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }
}

impl Default for RegistryConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `dispatch = DispatchMode::Locked`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            dispatch: DispatchMode::default(),
        }
    }
}
