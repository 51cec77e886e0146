//! # LogWriter: registry events through `tracing`
//!
//! A minimal observer that writes every incoming [`Event`] as a `tracing`
//! record under the `dispatchbus::events` target. Failures are logged at
//! `warn`, table mutations at `debug`, deliveries at `trace`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG dispatchbus::events: subscribed seq=0 channel="orders" once=false
//! TRACE dispatchbus::events: delivered seq=1 channel="orders" args=2
//!  WARN dispatchbus::events: handler_failed seq=2 channel="orders" reason="boom"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer observer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let label = e.kind.as_label();
        let channel = e.channel.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::Subscribed => {
                tracing::debug!(target: "dispatchbus::events", seq = e.seq, channel, once = ?e.once, "{label}");
            }
            EventKind::Unsubscribed | EventKind::OneShotConsumed => {
                tracing::debug!(target: "dispatchbus::events", seq = e.seq, channel, "{label}");
            }
            EventKind::Delivered | EventKind::NoHandler => {
                tracing::trace!(target: "dispatchbus::events", seq = e.seq, channel, args = ?e.args, "{label}");
            }
            _ => {
                tracing::warn!(target: "dispatchbus::events", seq = e.seq, channel, reason = ?e.reason, "{label}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
