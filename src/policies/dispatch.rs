//! # Dispatch modes for synchronous publish.
//!
//! [`DispatchMode`] decides whether the registry lock stays held while a handler runs.
//!
//! - [`DispatchMode::Locked`] the lock covers lookup, invocation and one-shot removal (default).
//! - [`DispatchMode::Detached`] the entry is copied out under the lock; the handler runs unlocked.
//!
//! ## Choosing a mode
//!
//! **Strict serialization** (no handler overlaps a registry call from another thread):
//! ```text
//! DispatchMode::Locked    → handlers run one at a time, bus-wide
//!                         → a handler may call back into the registry on its own thread
//!                         → a firing one-shot entry is invisible to nested publishes
//! ```
//!
//! **Handlers that publish or (un)subscribe themselves**:
//! ```text
//! DispatchMode::Detached  → handlers may re-enter the registry
//!                         → handlers on different channels may run concurrently
//!                         → an unsubscribe may race with an in-flight invocation
//! ```

/// Policy controlling how long the registry lock is held during `publish`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Hold the lock across lookup, invocation and one-shot removal (default).
    #[default]
    Locked,
    /// Take the entry out under the lock, release it, then invoke.
    ///
    /// One-shot entries are removed at lookup time, so two racing publishes
    /// still fire a one-shot handler at most once.
    Detached,
}

impl DispatchMode {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchMode::Locked => "locked",
            DispatchMode::Detached => "detached",
        }
    }

    /// Returns `true` when handlers run while the registry lock is held.
    #[inline]
    pub fn holds_lock(&self) -> bool {
        matches!(self, DispatchMode::Locked)
    }
}
