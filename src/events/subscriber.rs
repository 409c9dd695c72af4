//! Subscriber registry and fan-out.
//!
//! # Responsibilities
//! - Allocate unique subscriber IDs
//! - Track each subscriber's bounded output channel
//! - Deliver flushed batches without ever blocking the hub loop
//!
//! # Design Decisions
//! - `try_send` only: a full channel drops the event for that subscriber
//! - Each subscriber remembers the publish sequence at subscription time
//!   and never sees events published before it (no history replay)
//! - Subscribers whose receiver was dropped are pruned after the pass

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::event::Event;

/// Opaque subscriber identifier: registry epoch plus a sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId {
    epoch_nanos: u128,
    seq: u64,
}

impl SubscriberId {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}-{}", self.epoch_nanos, self.seq)
    }
}

/// An event stamped with its position in the publish order.
#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub seq: u64,
    pub event: Arc<Event>,
}

struct Subscriber {
    tx: mpsc::Sender<Arc<Event>>,
    /// Highest publish sequence issued before this subscriber joined.
    watermark: u64,
}

pub(crate) struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Subscriber>,
    next_seq: AtomicU64,
    epoch_nanos: u128,
    channel_size: usize,
}

impl SubscriberRegistry {
    pub fn new(channel_size: usize) -> Self {
        let epoch_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self {
            subscribers: DashMap::new(),
            next_seq: AtomicU64::new(0),
            epoch_nanos,
            channel_size: channel_size.max(1),
        }
    }

    fn next_id(&self) -> SubscriberId {
        SubscriberId {
            epoch_nanos: self.epoch_nanos,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    /// Register a new subscriber that only receives events published after
    /// `watermark`.
    pub fn register(&self, watermark: u64) -> (mpsc::Receiver<Arc<Event>>, SubscriberId) {
        let (tx, rx) = mpsc::channel(self.channel_size);
        let id = self.next_id();
        self.subscribers.insert(id.clone(), Subscriber { tx, watermark });
        tracing::debug!(subscriber = %id, "Subscriber registered");
        (rx, id)
    }

    /// An ID that was never registered paired with an already-closed channel.
    pub fn detached(&self) -> (mpsc::Receiver<Arc<Event>>, SubscriberId) {
        let (_, rx) = mpsc::channel(1);
        (rx, self.next_id())
    }

    /// Remove a subscriber, closing its channel. Unknown IDs are ignored.
    pub fn remove(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "Subscriber removed");
        }
        removed
    }

    /// Close every channel and forget every subscriber.
    pub fn clear(&self) {
        self.subscribers.clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Fan a batch out to every live subscriber.
    pub fn dispatch(&self, batch: &[Envelope]) {
        let mut disconnected = Vec::new();

        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            for envelope in batch.iter().filter(|e| e.seq > subscriber.watermark) {
                match subscriber.tx.try_send(envelope.event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::trace!(subscriber = %entry.key(), "Subscriber channel full, event dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        disconnected.push(entry.key().clone());
                        break;
                    }
                }
            }
        }

        for id in disconnected {
            if self.subscribers.remove(&id).is_some() {
                tracing::debug!(subscriber = %id, "Subscriber receiver dropped, pruned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::EventType;

    fn envelope(seq: u64) -> Envelope {
        Envelope {
            seq,
            event: Arc::new(Event::new(EventType::TaskStarted).with_data("seq", seq)),
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let registry = SubscriberRegistry::new(4);
        let (_rx1, a) = registry.register(0);
        let (_rx2, b) = registry.register(0);
        assert_ne!(a, b);
        assert!(b.seq() > a.seq());
        assert!(a.to_string().starts_with("sub-"));
    }

    #[test]
    fn test_full_channel_drops_only_for_that_subscriber() {
        let registry = SubscriberRegistry::new(2);
        let (mut slow, _) = registry.register(0);
        let (mut fast, _) = registry.register(0);

        registry.dispatch(&[envelope(1), envelope(2), envelope(3)]);

        let mut fast_seen = 0;
        while fast.try_recv().is_ok() {
            fast_seen += 1;
        }
        assert_eq!(fast_seen, 2);

        registry.dispatch(&[envelope(4)]);
        assert!(fast.try_recv().is_ok());

        let mut slow_seen = 0;
        while slow.try_recv().is_ok() {
            slow_seen += 1;
        }
        assert_eq!(slow_seen, 2);
    }

    #[test]
    fn test_watermark_hides_earlier_events() {
        let registry = SubscriberRegistry::new(8);
        let (mut rx, _) = registry.register(2);
        registry.dispatch(&[envelope(1), envelope(2), envelope(3)]);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.data["seq"], 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_is_idempotent_and_closes() {
        let registry = SubscriberRegistry::new(4);
        let (mut rx, id) = registry.register(0);

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert_eq!(registry.len(), 0);
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let registry = SubscriberRegistry::new(4);
        let (rx, _) = registry.register(0);
        drop(rx);
        registry.dispatch(&[envelope(1)]);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_detached_channel_is_closed() {
        let registry = SubscriberRegistry::new(4);
        let (mut rx, id) = registry.detached();
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
        assert!(!registry.remove(&id));
    }
}
