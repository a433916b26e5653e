//! # Event Publisher
//!
//! Defines the publishing side of the bus and its in-process implementation.

use crate::events::MirrorEvent;
use crate::subscriber::EventObserver;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// # Returns
    ///
    /// The number of observers that handled the event successfully.
    async fn publish(&self, event: MirrorEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// Ordered list of observers, dispatched inline on the publishing task.
#[derive(Default)]
pub struct ObserverBus {
    observers: RwLock<Vec<Arc<dyn EventObserver>>>,
    events_published: AtomicU64,
}

impl ObserverBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Observers are called in registration order.
    pub fn register(&self, observer: Arc<dyn EventObserver>) {
        debug!(observer = observer.name(), "Observer registered");
        self.observers.write().push(observer);
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

#[async_trait]
impl EventPublisher for ObserverBus {
    async fn publish(&self, event: MirrorEvent) -> usize {
        let topic = event.topic();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        // Snapshot the list so no lock is held across observer awaits.
        let observers: Vec<Arc<dyn EventObserver>> = self.observers.read().clone();

        let mut delivered = 0;
        for observer in observers {
            if !observer.topics().contains(&topic) {
                continue;
            }
            match observer.on_event(&event).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        observer = observer.name(),
                        topic = ?topic,
                        error = %e,
                        "Observer failed to handle event"
                    );
                }
            }
        }

        debug!(topic = ?topic, delivered, "Event published");
        delivered
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventTopic, MempoolChange};
    use crate::subscriber::ObserverError;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        topics: &'static [EventTopic],
        fail: bool,
        seen: Mutex<Vec<EventTopic>>,
    }

    impl Recorder {
        fn new(name: &'static str, topics: &'static [EventTopic], fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                topics,
                fail,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EventObserver for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn topics(&self) -> &'static [EventTopic] {
            self.topics
        }

        async fn on_event(&self, event: &MirrorEvent) -> Result<(), ObserverError> {
            self.seen.lock().push(event.topic());
            if self.fail {
                return Err(ObserverError::Failed("boom".into()));
            }
            Ok(())
        }
    }

    fn mempool_event() -> MirrorEvent {
        MirrorEvent::MempoolChanged(Arc::new(MempoolChange::default()))
    }

    #[tokio::test]
    async fn test_publish_no_observers() {
        let bus = ObserverBus::new();
        assert_eq!(bus.publish(mempool_event()).await, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_failing_observer_does_not_stop_delivery() {
        let bus = ObserverBus::new();
        let failing = Recorder::new("failing", &[EventTopic::Mempool], true);
        let healthy = Recorder::new("healthy", &[EventTopic::Mempool], false);
        bus.register(failing.clone());
        bus.register(healthy.clone());

        let delivered = bus.publish(mempool_event()).await;

        assert_eq!(delivered, 1);
        assert_eq!(failing.seen.lock().len(), 1);
        assert_eq!(healthy.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_topic_filtering() {
        let bus = ObserverBus::new();
        let blocks_only = Recorder::new("blocks", &[EventTopic::Blocks], false);
        bus.register(blocks_only.clone());

        assert_eq!(bus.publish(mempool_event()).await, 0);
        assert!(blocks_only.seen.lock().is_empty());

        bus.publish(MirrorEvent::DonationConfirmed("id".into())).await;
        assert!(blocks_only.seen.lock().is_empty());
        assert_eq!(bus.observer_count(), 1);
    }
}
