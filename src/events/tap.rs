//! Bridges between the event hub and the metrics registry.
//!
//! The hub never reports its own drops. Comparing
//! `events_published_total` (counted by [`InstrumentedPublisher`] before
//! publish) with `events_received_total` (counted by [`MetricsTap`] on the
//! consumer side) gives the loss rate per event type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::task::JoinHandle;

use super::event::{Event, EventType};
use super::hub::{EventHub, Publisher, Unsubscribe};
use crate::metrics::{Counter, Labels, Registry};

pub const EVENTS_PUBLISHED: &str = "events_published_total";
pub const EVENTS_RECEIVED: &str = "events_received_total";
pub const EVENT_DELIVERY_SECONDS: &str = "event_delivery_seconds";

fn type_labels(event_type: EventType) -> Labels {
    Labels::from([("type", event_type.as_str())])
}

/// Publisher wrapper that counts every event before handing it on.
#[derive(Debug)]
pub struct InstrumentedPublisher<P> {
    inner: P,
    registry: Arc<Registry>,
}

impl<P: Publisher> InstrumentedPublisher<P> {
    pub fn new(inner: P, registry: Arc<Registry>) -> Self {
        Self { inner, registry }
    }
}

impl<P: Publisher> Publisher for InstrumentedPublisher<P> {
    fn publish(&self, event: Event) {
        self.registry
            .register_counter(EVENTS_PUBLISHED, &type_labels(event.event_type))
            .inc();
        self.inner.publish(event);
    }
}

/// A hub subscriber that turns received events into metrics.
pub struct MetricsTap {
    task: JoinHandle<u64>,
    unsubscribe: Unsubscribe,
}

impl MetricsTap {
    /// Subscribe to `hub` and start counting on a background task.
    pub fn spawn(hub: &EventHub, registry: Arc<Registry>) -> Self {
        let (mut rx, unsubscribe) = hub.subscribe();

        let task = tokio::spawn(async move {
            let delivery = registry.register_histogram(EVENT_DELIVERY_SECONDS, &Labels::new(), None);
            let mut counters: HashMap<EventType, Arc<Counter>> = HashMap::new();
            let mut received = 0u64;

            while let Some(event) = rx.recv().await {
                counters
                    .entry(event.event_type)
                    .or_insert_with(|| registry.register_counter(EVENTS_RECEIVED, &type_labels(event.event_type)))
                    .inc();

                if let Ok(lag) = SystemTime::now().duration_since(event.timestamp) {
                    delivery.observe_duration(lag);
                }
                received += 1;
            }

            tracing::debug!(received, "Metrics tap stream ended");
            received
        });

        Self { task, unsubscribe }
    }

    /// Leave the hub and return how many events the tap consumed.
    pub async fn stop(self) -> u64 {
        let MetricsTap { task, unsubscribe } = self;
        unsubscribe.unsubscribe();
        received_count(task).await
    }

    /// Wait for the stream to end (hub closed) and return the event count.
    pub async fn join(self) -> u64 {
        received_count(self.task).await
    }
}

async fn received_count(task: JoinHandle<u64>) -> u64 {
    match task.await {
        Ok(received) => received,
        Err(e) => {
            tracing::error!(error = %e, "Metrics tap task failed");
            0
        }
    }
}
