//! Error types used by the registry and by handler invocation.
//!
//! This module defines:
//!
//! - [`BusError`]: errors returned by [`Registry`](crate::Registry) operations.
//! - [`ArgError`]: mismatch between published arguments and a handler's parameters.
//! - [`HandlerError`]: boxed error a handler may return.
//!
//! [`BusError`] provides `as_label` for logs/metrics, mirroring the event kinds.

use thiserror::Error;

/// Error a handler may return from its body.
///
/// Handlers returning `Result<(), E>` have `E` converted into this type.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Argument mismatch detected at call time.
///
/// The registry never inspects a handler's signature at subscribe time; the
/// typed adapters produced by [`IntoHandler`](crate::IntoHandler) report these
/// when the published [`Args`](crate::Args) do not fit.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    /// Wrong number of positional arguments.
    #[error("expected {expected} argument(s), got {got}")]
    Arity {
        /// Parameters declared by the handler.
        expected: usize,
        /// Arguments carried by the publish call.
        got: usize,
    },

    /// Argument at `index` holds a different type than the parameter.
    #[error("argument {index}: expected `{expected}`, found `{found}`")]
    Type {
        /// Zero-based position of the offending argument.
        index: usize,
        /// Parameter type declared by the handler.
        expected: &'static str,
        /// Type the argument was built from.
        found: &'static str,
    },
}

/// # Errors produced by registry operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// The value passed to a subscribe call is not a handler.
    #[error("value of type `{found}` is not a handler")]
    InvalidHandler {
        /// Type name of the rejected value.
        found: &'static str,
    },

    /// No entry is registered for the channel.
    #[error("channel `{channel}` has no handler")]
    NotFound {
        /// Requested channel.
        channel: String,
    },

    /// Published arguments do not match the handler's parameters.
    #[error("cannot invoke handler on `{channel}`: {source}")]
    Invocation {
        /// Channel being published.
        channel: String,
        /// Mismatch details.
        #[source]
        source: ArgError,
    },

    /// The handler ran and returned an error.
    #[error("handler on `{channel}` failed: {source}")]
    Handler {
        /// Channel being published.
        channel: String,
        /// Error returned by the handler.
        #[source]
        source: HandlerError,
    },

    /// Observers were configured but no tokio runtime is available to drive them.
    #[error("observers require a tokio runtime; none is running and none was provided")]
    RuntimeUnavailable,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use dispatchbus::BusError;
    ///
    /// let err = BusError::NotFound { channel: "orders".into() };
    /// assert_eq!(err.as_label(), "bus_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::InvalidHandler { .. } => "bus_invalid_handler",
            BusError::NotFound { .. } => "bus_not_found",
            BusError::Invocation { .. } => "bus_invocation",
            BusError::Handler { .. } => "bus_handler_failed",
            BusError::RuntimeUnavailable => "bus_runtime_unavailable",
        }
    }

    /// Returns the channel this error refers to, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            BusError::NotFound { channel }
            | BusError::Invocation { channel, .. }
            | BusError::Handler { channel, .. } => Some(channel),
            BusError::InvalidHandler { .. } | BusError::RuntimeUnavailable => None,
        }
    }

    /// Indicates whether the error came from running the handler
    /// (as opposed to a registry-level rejection).
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, BusError::Handler { .. } | BusError::Invocation { .. })
    }
}
