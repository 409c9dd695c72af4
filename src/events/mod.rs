//! Event subsystem.
//!
//! # Data Flow
//! ```text
//! Producer
//!     → EventHub::publish (non-blocking enqueue, drop if full)
//!     → processing loop (hub.rs)
//!     → TokenBucket gate (rate_limit.rs, drop if empty)
//!     → batch accumulator (flush on size or ticker)
//!     → SubscriberRegistry::dispatch (subscriber.rs, try_send per subscriber)
//!     → consumers (MetricsTap in tap.rs, diagnostics, UIs)
//! ```
//!
//! # Design Decisions
//! - Best effort, at most once: every drop is silent
//! - Exactly one task owns the queue for the hub's whole life
//! - Batch, limiter and subscriber map are locked independently and never
//!   nested

pub mod event;
pub mod hub;
pub mod rate_limit;
pub mod subscriber;
pub mod tap;

pub use event::{Event, EventType};
pub use hub::{EventHub, HubStats, Publisher, Unsubscribe};
pub use rate_limit::{Clock, ManualClock, SystemClock, TokenBucket};
pub use subscriber::SubscriberId;
pub use tap::{InstrumentedPublisher, MetricsTap};
