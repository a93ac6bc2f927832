use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::web::models::feed_models::FeedEvent;

pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Fans push events out to every connected observer.
///
/// Sending never waits on observers. An observer that falls more than the
/// channel capacity behind skips the oldest events; one that has gone away
/// simply stops being counted. Observers only see events sent after they
/// subscribed.
#[derive(Debug, Clone)]
pub struct FeedHub {
    tx: broadcast::Sender<FeedEvent>,
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl FeedHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Delivers `event` to the observers connected right now and returns how
    /// many that was.
    pub fn broadcast(&self, event: FeedEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(observers) => {
                trace!(event = name, observers, "Broadcast feed event.");
                observers
            }
            Err(_) => {
                debug!(event = name, "No observers connected. Dropping feed event.");
                0
            }
        }
    }
}
