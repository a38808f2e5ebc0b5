//! Snapshot delivery to subscribers
//!
//! The clock pushes a full snapshot every tick and the request layer pushes
//! on-demand snapshots. Delivery is fire-and-forget: a publish with nobody
//! listening, or a subscriber that lags, never blocks the publisher.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::sim::{Dimensions, Shape};

/// Point-in-time copy of the whole population, cheap to fan out
pub type Snapshot = Arc<[Shape]>;

/// Payload carried on the shape channel
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    /// Full shape list. `tick` is `None` for on-demand snapshots.
    Shapes { tick: Option<u64>, shapes: Snapshot },
    /// Panel size after a change
    Panel(Dimensions),
}

/// Receives snapshots and hands them to subscribers
pub trait Broadcaster: Send + Sync {
    /// Channel name, for logs and transports
    fn topic(&self) -> &str;

    fn publish(&self, feed: Feed);
}

/// `Broadcaster` over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    topic: String,
    tx: broadcast::Sender<Feed>,
}

impl ChannelBroadcaster {
    pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            topic: topic.into(),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Feed> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, feed: Feed) {
        // Err only means nobody is subscribed right now
        if self.tx.send(feed).is_err() {
            log::trace!("No subscribers on {}", self.topic);
        }
    }
}
