//! End-to-end behaviour of the event hub.

use std::sync::Arc;
use std::time::Duration;

use telemetry_hub::config::HubConfig;
use telemetry_hub::events::{Event, EventHub, EventType, ManualClock};

mod common;

#[tokio::test]
async fn test_late_subscriber_sees_no_replay() {
    let config = HubConfig {
        batch_size: 2,
        ..HubConfig::default()
    };
    let hub = EventHub::new(config);

    for i in 0..5 {
        hub.publish(Event::new(EventType::TaskStarted).with_data("i", i));
    }

    let (mut rx, _unsubscribe) = hub.subscribe();
    hub.flush().await;

    assert!(common::drain(&mut rx).is_empty());
    hub.close().await;
}

#[tokio::test]
async fn test_default_config_delivers_exactly_once() {
    let hub = EventHub::new(HubConfig::default());
    let (mut rx, _unsubscribe) = hub.subscribe();

    hub.publish(Event::new(EventType::SessionStarted).with_session("s-1"));
    hub.flush().await;

    let events = common::drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].session_id.as_deref(), Some("s-1"));

    hub.close().await;
}

#[tokio::test]
async fn test_zero_config_uses_defaults() {
    let hub = EventHub::new(HubConfig {
        event_queue_size: 0,
        batch_size: 0,
        flush_interval_ms: 0,
        rate_limit: 0,
        subscriber_channel_size: 0,
    });

    assert_eq!(hub.config(), &HubConfig::default());
    assert_eq!(hub.stats().rate_limit, 10_000);
    hub.close().await;
}

#[tokio::test]
async fn test_slow_subscriber_does_not_block_fast_one() {
    let config = HubConfig {
        subscriber_channel_size: 4,
        ..common::quiet_config()
    };
    let hub = EventHub::new(config);
    let (mut slow, _slow_handle) = hub.subscribe();
    let (mut fast, _fast_handle) = hub.subscribe();

    let mut fast_total = 0;
    for _ in 0..3 {
        for _ in 0..4 {
            hub.publish(Event::new(EventType::ModelStreamChunk));
        }
        hub.flush().await;
        fast_total += common::drain(&mut fast).len();
    }

    assert_eq!(fast_total, 12);
    assert_eq!(common::drain(&mut slow).len(), 4);
    assert_eq!(hub.stats().subscriber_count, 2);

    hub.close().await;
}

#[tokio::test]
async fn test_dropped_receiver_is_pruned() {
    let hub = EventHub::new(common::quiet_config());
    let (rx, _unsubscribe) = hub.subscribe();
    let (mut live, _live_handle) = hub.subscribe();
    drop(rx);

    hub.publish(Event::new(EventType::TaskCompleted));
    hub.flush().await;

    assert_eq!(common::drain(&mut live).len(), 1);
    assert_eq!(hub.stats().subscriber_count, 1);
    hub.close().await;
}

#[tokio::test]
async fn test_rate_limit_caps_admission() {
    let clock = Arc::new(ManualClock::new());
    let config = HubConfig {
        rate_limit: 10,
        ..common::quiet_config()
    };
    let hub = EventHub::with_clock(config, clock.clone());
    let (mut rx, _unsubscribe) = hub.subscribe();

    for _ in 0..50 {
        hub.publish(Event::new(EventType::ToolExecutionStarted));
    }
    hub.flush().await;
    assert_eq!(common::drain(&mut rx).len(), 10);

    clock.advance(Duration::from_secs(1));
    for _ in 0..50 {
        hub.publish(Event::new(EventType::ToolExecutionCompleted));
    }
    hub.flush().await;

    let refilled = common::drain(&mut rx);
    assert_eq!(refilled.len(), 10);
    assert!(refilled
        .iter()
        .all(|e| e.event_type == EventType::ToolExecutionCompleted));

    hub.close().await;
}

#[tokio::test]
async fn test_below_rate_limit_nothing_is_dropped() {
    let clock = Arc::new(ManualClock::new());
    let config = HubConfig {
        rate_limit: 1_000,
        ..common::quiet_config()
    };
    let hub = EventHub::with_clock(config, clock);
    let (mut rx, _unsubscribe) = hub.subscribe();

    for _ in 0..100 {
        hub.publish(Event::new(EventType::TaskStarted));
    }
    hub.flush().await;

    assert_eq!(common::drain(&mut rx).len(), 100);
    hub.close().await;
}

#[tokio::test]
async fn test_single_publisher_order_is_preserved() {
    let hub = EventHub::new(common::quiet_config());
    let (mut rx, _unsubscribe) = hub.subscribe();

    for i in 0..200u64 {
        hub.publish(Event::new(EventType::ModelStreamChunk).with_data("i", i));
    }
    hub.flush().await;

    let order: Vec<u64> = common::drain(&mut rx)
        .iter()
        .filter_map(|e| e.data.get("i").and_then(|v| v.as_u64()))
        .collect();
    assert_eq!(order, (0..200).collect::<Vec<_>>());

    hub.close().await;
}

#[tokio::test]
async fn test_concurrent_publishers() {
    let hub = Arc::new(EventHub::new(HubConfig {
        event_queue_size: 4_096,
        ..common::quiet_config()
    }));
    let (mut rx, _unsubscribe) = hub.subscribe();

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..100 {
                hub.publish(
                    Event::new(EventType::TaskStarted)
                        .with_data("worker", worker)
                        .with_data("i", i),
                );
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    hub.flush().await;

    let events = common::collect_until_closed(&mut rx, Duration::from_millis(50)).await;
    assert_eq!(events.len(), 800);
    hub.close().await;
}

#[tokio::test]
async fn test_close_drains_queued_events() {
    let hub = EventHub::new(common::quiet_config());
    let (mut rx, _unsubscribe) = hub.subscribe();

    for _ in 0..20 {
        hub.publish(Event::new(EventType::PlanCompleted));
    }
    hub.close().await;

    let events = common::collect_until_closed(&mut rx, Duration::from_secs(1)).await;
    assert_eq!(events.len(), 20);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_closed_hub_rejects_everything() {
    let hub = EventHub::new(common::quiet_config());
    let (_rx, _unsubscribe) = hub.subscribe();
    hub.close().await;

    let stats = hub.stats();
    assert_eq!(stats.subscriber_count, 0);
    assert_eq!(stats.queue_depth, 0);

    hub.publish(Event::new(EventType::TaskFailed));
    assert_eq!(hub.stats().queue_depth, 0);

    let (mut late, _) = hub.subscribe();
    assert!(late.recv().await.is_none());
    assert_eq!(hub.stats().subscriber_count, 0);
}

#[tokio::test]
async fn test_stop_then_wait_delivers_before_close() {
    let hub = EventHub::new(common::quiet_config());
    let (mut rx, _unsubscribe) = hub.subscribe();

    for _ in 0..5 {
        hub.publish(Event::new(EventType::ExperimentStarted));
    }
    hub.stop();
    hub.wait().await;

    assert_eq!(common::drain(&mut rx).len(), 5);
    assert_eq!(hub.stats().subscriber_count, 1);
    hub.close().await;
    assert_eq!(hub.stats().subscriber_count, 0);
}
