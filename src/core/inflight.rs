//! # Join barrier for asynchronous publishes.
//!
//! [`InFlight`] counts publishes scheduled by `publish_async` that have not
//! finished yet. Each scheduled publish holds an [`InFlightGuard`]; dropping the
//! guard (normal return, error or unwind) decrements the count.
//!
//! ```text
//! publish_async ──► enter() ──► count += 1 ──► spawn(task owning guard)
//!                                                   └─► drop(guard) ──► count -= 1
//! wait() ──► resolves once count == 0
//! ```
//!
//! The barrier is count-based: a waiter returns the first time it observes
//! zero. Publishes scheduled while a waiter is blocked extend its wait only if
//! they are entered before the count drains.

use std::sync::Arc;

use tokio::sync::watch;

/// Counter of outstanding async publishes.
#[derive(Debug)]
pub struct InFlight {
    count: watch::Sender<usize>,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        let (count, _rx) = watch::channel(0);
        Arc::new(Self { count })
    }

    /// Registers one unit of outstanding work.
    #[must_use = "dropping the guard immediately releases the barrier"]
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.send_modify(|n| *n += 1);
        InFlightGuard {
            owner: Arc::clone(self),
        }
    }

    /// Current number of outstanding units.
    pub fn current(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once no work is outstanding.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Blocks the calling thread until no work is outstanding.
    ///
    /// Must not be called from inside an async runtime worker, nor by a holder
    /// of an [`InFlightGuard`]: its own unit keeps the count above zero.
    pub fn wait_blocking(&self) {
        futures::executor::block_on(self.wait());
    }
}

/// Releases one unit of outstanding work on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    owner: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owner.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
