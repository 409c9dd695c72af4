//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use telemetry_hub::config::HubConfig;
use telemetry_hub::events::Event;

/// Hub config whose ticker never fires during a test, so only explicit
/// flushes and the batch-size trigger deliver events.
pub fn quiet_config() -> HubConfig {
    HubConfig {
        event_queue_size: 1_024,
        batch_size: 1_024,
        flush_interval_ms: 60_000,
        rate_limit: 100_000,
        subscriber_channel_size: 1_024,
    }
}

/// Take everything currently buffered in a subscriber channel.
pub fn drain(rx: &mut mpsc::Receiver<Arc<Event>>) -> Vec<Arc<Event>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Read until the stream closes or `timeout` passes with nothing new.
pub async fn collect_until_closed(
    rx: &mut mpsc::Receiver<Arc<Event>>,
    timeout: Duration,
) -> Vec<Arc<Event>> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(timeout, rx.recv()).await {
        events.push(event);
    }
    events
}
