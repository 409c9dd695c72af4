//! Admission-controlled, batched multicast event hub.
//!
//! # States
//! - Running: accepting publishes, loop active
//! - Stopping: shutdown triggered, loop signalled to finish
//! - Drained: loop flushed what was queued and exited
//! - Closed: every subscriber channel closed, registry empty
//!
//! # State Transitions
//! ```text
//! Running → Stopping: stop() (or drop)
//! Stopping → Drained: loop drains the queue, flushes, exits
//! Drained → Closed: close() clears the subscriber registry
//! ```
//!
//! # Design Decisions
//! - `publish` never blocks: full queue means the event is dropped
//! - The rate limiter sits between queue and batch, not on `publish`
//! - Flushes swap the batch out before dispatching, so new events land in
//!   a fresh batch while the old one fans out
//! - `flush()` is served by the loop itself after draining what is already
//!   queued, so anything published before the call is delivered on return
//! - Shutdown drains the queue without rate limiting: admitted events are
//!   not lost

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::{self, MissedTickBehavior};

use super::event::Event;
use super::rate_limit::{Clock, SystemClock, TokenBucket};
use super::subscriber::{Envelope, SubscriberId, SubscriberRegistry};
use crate::config::HubConfig;
use crate::lifecycle::Shutdown;

const FLUSH_REQUEST_CAPACITY: usize = 16;

/// Point-in-time introspection of a hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStats {
    pub subscriber_count: usize,
    pub queue_depth: usize,
    pub current_batch_size: usize,
    pub rate_limit: u32,
}

/// Anything events can be published to.
///
/// `Option<P>` is a valid sink: `None` discards everything, so
/// instrumentation can hold an optional hub without checking it.
pub trait Publisher {
    fn publish(&self, event: Event);
}

/// Pub/sub broker for telemetry events.
///
/// Must be created inside a Tokio runtime: construction spawns the
/// processing loop.
pub struct EventHub {
    shared: Arc<Shared>,
    queue_tx: mpsc::Sender<Envelope>,
    flush_tx: mpsc::Sender<oneshot::Sender<()>>,
    shutdown: Shutdown,
    done: watch::Receiver<bool>,
    published: AtomicU64,
}

/// State shared between the hub handle and its processing loop.
struct Shared {
    config: HubConfig,
    batch: Mutex<Vec<Envelope>>,
    limiter: Mutex<TokenBucket>,
    subscribers: SubscriberRegistry,
}

/// Handle that removes one subscription when invoked.
#[derive(Debug)]
pub struct Unsubscribe {
    id: SubscriberId,
    shared: Weak<Shared>,
}

impl Unsubscribe {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Remove the subscription and close its channel.
    pub fn unsubscribe(self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("config", &self.config)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventHub {
    /// Create a hub and start its processing loop.
    pub fn new(config: HubConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a hub whose rate limiter reads time from `clock`.
    pub fn with_clock(config: HubConfig, clock: Arc<dyn Clock>) -> Self {
        let config = config.normalized();

        let (queue_tx, queue_rx) = mpsc::channel(config.event_queue_size);
        let (flush_tx, flush_rx) = mpsc::channel(FLUSH_REQUEST_CAPACITY);
        let (done_tx, done) = watch::channel(false);
        let shutdown = Shutdown::new();

        let shared = Arc::new(Shared {
            batch: Mutex::new(Vec::with_capacity(config.batch_size)),
            limiter: Mutex::new(TokenBucket::new(config.rate_limit, clock)),
            subscribers: SubscriberRegistry::new(config.subscriber_channel_size),
            config,
        });

        let processor = Processor {
            shared: shared.clone(),
            queue_rx,
            flush_rx,
            shutdown_rx: shutdown.subscribe(),
        };
        tokio::spawn(async move {
            processor.run().await;
            let _ = done_tx.send(true);
        });

        tracing::info!(
            queue_size = shared.config.event_queue_size,
            batch_size = shared.config.batch_size,
            flush_interval_ms = shared.config.flush_interval_ms,
            rate_limit = shared.config.rate_limit,
            subscriber_channel_size = shared.config.subscriber_channel_size,
            "Event hub started"
        );

        Self {
            shared,
            queue_tx,
            flush_tx,
            shutdown,
            done,
            published: AtomicU64::new(0),
        }
    }

    /// Effective (normalized) configuration.
    pub fn config(&self) -> &HubConfig {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Enqueue an event without blocking.
    ///
    /// Discarded silently when the hub is closed or the queue is full.
    pub fn publish(&self, mut event: Event) {
        if self.is_closed() {
            return;
        }
        event.stamp_if_unset();

        let seq = self.published.fetch_add(1, Ordering::AcqRel) + 1;
        let envelope = Envelope {
            seq,
            event: Arc::new(event),
        };
        if let Err(TrySendError::Full(_)) = self.queue_tx.try_send(envelope) {
            tracing::trace!("Event queue full, event dropped");
        }
    }

    /// Subscribe, returning the event stream and a handle to leave.
    pub fn subscribe(&self) -> (mpsc::Receiver<Arc<Event>>, Unsubscribe) {
        let (rx, id) = self.subscribe_with_id();
        let handle = Unsubscribe {
            id,
            shared: Arc::downgrade(&self.shared),
        };
        (rx, handle)
    }

    /// Subscribe, returning the event stream and the raw subscriber ID.
    ///
    /// On a closed hub the returned stream is already terminated.
    pub fn subscribe_with_id(&self) -> (mpsc::Receiver<Arc<Event>>, SubscriberId) {
        if self.is_closed() {
            return self.shared.subscribers.detached();
        }

        let watermark = self.published.load(Ordering::Acquire);
        let (rx, id) = self.shared.subscribers.register(watermark);

        // Lost a race with close(): do not leave the channel open.
        if self.is_closed() {
            self.shared.subscribers.remove(&id);
        }
        (rx, id)
    }

    /// Remove a subscriber and close its channel. Unknown IDs are ignored.
    pub fn unsubscribe(&self, id: &SubscriberId) {
        self.shared.subscribers.remove(id);
    }

    /// Deliver everything published so far, without waiting for the ticker.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.flush_tx.send(ack_tx).await.is_err() {
            // Loop already exited; only a stray batch could remain.
            self.shared.flush_batch();
            return;
        }
        let _ = ack_rx.await;
    }

    /// Stop accepting events and signal the loop to drain and exit.
    pub fn stop(&self) {
        if !self.shutdown.trigger() {
            return;
        }
        tracing::debug!("Event hub stopping");
    }

    /// Wait until the processing loop has exited.
    pub async fn wait(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }

    /// Stop, wait for the drain, then close every subscriber channel.
    pub async fn close(&self) {
        self.stop();
        self.wait().await;
        self.shared.subscribers.clear();
        tracing::info!("Event hub closed");
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            subscriber_count: self.shared.subscribers.len(),
            queue_depth: self.queue_tx.max_capacity() - self.queue_tx.capacity(),
            current_batch_size: self.shared.lock_batch().len(),
            rate_limit: self.shared.config.rate_limit,
        }
    }
}

impl Drop for EventHub {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("shared", &self.shared)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Publisher for EventHub {
    fn publish(&self, event: Event) {
        EventHub::publish(self, event);
    }
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, event: Event) {
        (**self).publish(event);
    }
}

impl<P: Publisher + ?Sized> Publisher for &P {
    fn publish(&self, event: Event) {
        (**self).publish(event);
    }
}

impl<P: Publisher> Publisher for Option<P> {
    fn publish(&self, event: Event) {
        if let Some(publisher) = self {
            publisher.publish(event);
        }
    }
}

impl Shared {
    fn lock_batch(&self) -> MutexGuard<'_, Vec<Envelope>> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rate-limit gate between queue and batch.
    fn admit(&self, envelope: Envelope) {
        let allowed = self
            .limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire();
        if !allowed {
            tracing::trace!("Rate limit exceeded, event dropped");
            return;
        }
        self.push(envelope);
    }

    fn push(&self, envelope: Envelope) {
        let full = {
            let mut batch = self.lock_batch();
            batch.push(envelope);
            batch.len() >= self.config.batch_size
        };
        if full {
            self.flush_batch();
        }
    }

    fn flush_batch(&self) {
        let batch = {
            let mut batch = self.lock_batch();
            if batch.is_empty() {
                return;
            }
            std::mem::replace(&mut *batch, Vec::with_capacity(self.config.batch_size))
        };
        self.subscribers.dispatch(&batch);
    }
}

/// The single background task that owns the queue.
struct Processor {
    shared: Arc<Shared>,
    queue_rx: mpsc::Receiver<Envelope>,
    flush_rx: mpsc::Receiver<oneshot::Sender<()>>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Processor {
    async fn run(mut self) {
        let mut ticker = time::interval(self.shared.config.flush_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    self.drain_on_shutdown();
                    break;
                }
                Some(ack) = self.flush_rx.recv() => {
                    self.drain_queued();
                    self.shared.flush_batch();
                    let _ = ack.send(());
                }
                Some(envelope) = self.queue_rx.recv() => {
                    self.shared.admit(envelope);
                }
                _ = ticker.tick() => {
                    self.shared.flush_batch();
                }
            }
        }

        tracing::debug!("Event hub loop exited");
    }

    /// Move what is queued right now into the batch, through the limiter.
    fn drain_queued(&mut self) {
        // Bounded so a steady stream of publishers cannot starve the caller.
        for _ in 0..self.shared.config.event_queue_size {
            match self.queue_rx.try_recv() {
                Ok(envelope) => self.shared.admit(envelope),
                Err(_) => break,
            }
        }
    }

    fn drain_on_shutdown(&mut self) {
        self.queue_rx.close();
        let mut drained = 0usize;
        while let Ok(envelope) = self.queue_rx.try_recv() {
            self.shared.push(envelope);
            drained += 1;
        }
        self.shared.flush_batch();
        tracing::debug!(drained, "Event hub drained queue on shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::EventType;

    fn small_config() -> HubConfig {
        HubConfig {
            event_queue_size: 64,
            batch_size: 8,
            flush_interval_ms: 60_000,
            rate_limit: 10_000,
            subscriber_channel_size: 64,
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe_flush() {
        let hub = EventHub::new(HubConfig::default());
        let (mut rx, _unsubscribe) = hub.subscribe();

        hub.publish(Event::new(EventType::TaskStarted).with_task("t-1"));
        hub.flush().await;

        let event = rx.try_recv().expect("event delivered by flush");
        assert_eq!(event.event_type, EventType::TaskStarted);
        assert_eq!(event.task_id.as_deref(), Some("t-1"));
        assert!(event.is_stamped());
        assert!(rx.try_recv().is_err());

        hub.close().await;
    }

    #[tokio::test]
    async fn test_batch_size_triggers_flush() {
        let mut config = small_config();
        config.batch_size = 3;
        let hub = EventHub::new(config);
        let (mut rx, _) = hub.subscribe_with_id();

        for _ in 0..3 {
            hub.publish(Event::new(EventType::ToolExecutionStarted));
        }

        // Ticker interval is a minute: only the size trigger can deliver.
        let first = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("size-triggered flush");
        assert!(first.is_some());
        assert_eq!(hub.stats().current_batch_size, 0);

        hub.close().await;
    }

    #[tokio::test]
    async fn test_ticker_bounds_latency() {
        let mut config = small_config();
        config.flush_interval_ms = 20;
        let hub = EventHub::new(config);
        let (mut rx, _) = hub.subscribe();

        hub.publish(Event::new(EventType::PlanStarted));
        let received = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(received, Ok(Some(_))));

        hub.close().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_handle() {
        let hub = EventHub::new(small_config());
        let (mut rx, unsubscribe) = hub.subscribe();
        assert_eq!(hub.stats().subscriber_count, 1);

        let id = unsubscribe.id().clone();
        unsubscribe.unsubscribe();
        hub.unsubscribe(&id);
        assert_eq!(hub.stats().subscriber_count, 0);
        assert!(rx.recv().await.is_none());

        hub.close().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let hub = EventHub::new(small_config());
        assert!(!hub.is_closed());
        hub.stop();
        assert!(hub.is_closed());
        hub.stop();
        hub.wait().await;
        hub.close().await;
        hub.close().await;
        assert!(hub.is_closed());
    }

    #[tokio::test]
    async fn test_optional_publisher() {
        let hub = Arc::new(EventHub::new(small_config()));
        let (mut rx, _) = hub.subscribe();

        let none: Option<Arc<EventHub>> = None;
        none.publish(Event::new(EventType::SessionStarted));
        Some(hub.clone()).publish(Event::new(EventType::SessionEnded));
        hub.flush().await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::SessionEnded);
        hub.close().await;
    }

    #[tokio::test]
    async fn test_flush_after_close_is_safe() {
        let hub = EventHub::new(small_config());
        hub.close().await;
        hub.flush().await;
        hub.publish(Event::new(EventType::TaskFailed));
        assert_eq!(hub.stats().queue_depth, 0);
    }
}
