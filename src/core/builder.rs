use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{
    config::RegistryConfig,
    registry::{Registry, Spawner},
};
use crate::{
    error::BusError,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Registry`] with observers or an explicit runtime.
pub struct RegistryBuilder {
    cfg: RegistryConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    runtime: Option<Handle>,
}

impl RegistryBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: RegistryConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            runtime: None,
        }
    }

    /// Sets observers for registry events.
    ///
    /// Observers receive events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds a single observer.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Runs async publishes and observer workers on `rt`.
    ///
    /// Without it, the runtime current at [`build`](Self::build) time is used, if any.
    pub fn with_runtime(mut self, rt: Handle) -> Self {
        self.runtime = Some(rt);
        self
    }

    /// Builds and returns the registry.
    ///
    /// - Event bus sized by [`RegistryConfig::bus_capacity_clamped`]
    /// - Observer workers and the listener feeding them (if observers were given)
    /// - Async publish spawner (runtime blocking pool, or threads without a runtime)
    ///
    /// Fails with [`BusError::RuntimeUnavailable`] when observers were given but
    /// no runtime is available to drive them.
    pub fn build(self) -> Result<Arc<Registry>, BusError> {
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let shutdown = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let rt = runtime.as_ref().ok_or(BusError::RuntimeUnavailable)?;
            let set = SubscriberSet::new(self.subscribers, bus.clone(), rt);
            spawn_listener(rt, &bus, set, shutdown.clone());
        }

        let spawner = runtime.map_or(Spawner::Thread, Spawner::Tokio);
        tracing::debug!(
            dispatch = self.cfg.dispatch.as_label(),
            bus_capacity = self.cfg.bus_capacity_clamped(),
            "registry built"
        );
        Ok(Arc::new(Registry::new_internal(
            &self.cfg, bus, spawner, shutdown,
        )))
    }
}

/// Forwards bus events to the observer set until the registry is dropped.
///
/// Events already queued on the bus when shutdown fires are still delivered,
/// then the observer workers are drained.
fn spawn_listener(rt: &Handle, bus: &Bus, set: SubscriberSet, shutdown: CancellationToken) {
    let mut rx = bus.subscribe();

    rt.spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(Arc::new(ev)),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "observer listener lagged");
                        continue;
                    }
                }
            }
        }

        while let Ok(ev) = rx.try_recv() {
            set.emit(Arc::new(ev));
        }
        set.shutdown().await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::events::{Event, EventKind};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.kinds.lock().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[test]
    fn test_observers_without_runtime_rejected() {
        let res = RegistryBuilder::new(RegistryConfig::default())
            .with_subscriber(Arc::new(Recorder::default()))
            .build();
        assert!(matches!(res, Err(BusError::RuntimeUnavailable)));
    }

    #[test]
    fn test_build_without_observers_needs_no_runtime() {
        let reg = RegistryBuilder::new(RegistryConfig::default()).build().unwrap();
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_registry_activity() {
        let rec = Arc::new(Recorder::default());
        let reg = Registry::builder(RegistryConfig::default())
            .with_subscriber(rec.clone())
            .build()
            .unwrap();

        reg.subscribe("c", || ()).unwrap();
        reg.publish("c", args![]).unwrap();
        reg.unsubscribe("c").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while rec.kinds.lock().len() < 3 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            *rec.kinds.lock(),
            vec![EventKind::Subscribed, EventKind::Delivered, EventKind::Unsubscribed]
        );
    }

    #[test]
    fn test_explicit_runtime_drives_observers() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let rec = Arc::new(Recorder::default());
        let reg = RegistryBuilder::new(RegistryConfig::default())
            .with_runtime(rt.handle().clone())
            .with_subscriber(rec.clone())
            .build()
            .unwrap();

        reg.subscribe("c", |_: u8| ()).unwrap();
        reg.publish_async("c", args![1_u8]);
        reg.wait_async_blocking();

        rt.block_on(async {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            while !rec.kinds.lock().contains(&EventKind::Delivered)
                && tokio::time::Instant::now() < deadline
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });
        assert!(rec.kinds.lock().contains(&EventKind::Delivered));
    }
}
