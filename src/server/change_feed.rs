//! Polls the check log for new records and pushes them to observers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alerting::anomaly_detector::AnomalyDetector;
use crate::db::store::{truncate_to_micros, CheckStore};
use crate::server::feed_hub::FeedHub;
use crate::web::models::feed_models::FeedEvent;

pub const DEFAULT_FEED_INTERVAL: Duration = Duration::from_millis(2000);

/// What a single publisher tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedTickOutcome {
    /// Records pushed in the `newCheck` batch (0 when nothing was sent).
    pub delivered: usize,
    pub anomaly_raised: bool,
}

/// Delivers stored checks of the current target in batches.
///
/// Watermarks are kept per target. A target seen for the first time starts at
/// the publisher's origin instant, so older history is never replayed and
/// switching targets cannot carry one target's watermark over to another.
pub struct ChangeFeedPublisher {
    store: Arc<dyn CheckStore>,
    detector: AnomalyDetector,
    hub: FeedHub,
    target_rx: watch::Receiver<Option<String>>,
    watermarks: HashMap<String, DateTime<Utc>>,
    origin: DateTime<Utc>,
    interval: Duration,
}

impl ChangeFeedPublisher {
    pub fn new(
        store: Arc<dyn CheckStore>,
        hub: FeedHub,
        target_rx: watch::Receiver<Option<String>>,
    ) -> Self {
        Self {
            detector: AnomalyDetector::new(Arc::clone(&store)),
            store,
            hub,
            target_rx,
            watermarks: HashMap::new(),
            // Store timestamps are whole microseconds; a record stamped in
            // the creation microsecond is still new.
            origin: truncate_to_micros(Utc::now()) - chrono::Duration::microseconds(1),
            interval: DEFAULT_FEED_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Moves the starting watermark for unseen targets back to `since`.
    pub fn replaying_since(mut self, since: DateTime<Utc>) -> Self {
        self.origin = since;
        self
    }

    pub fn watermark(&self, target: &str) -> DateTime<Utc> {
        self.watermarks.get(target).copied().unwrap_or(self.origin)
    }

    fn advance_watermark(&mut self, target: &str, to: DateTime<Utc>) {
        let origin = self.origin;
        let mark = self.watermarks.entry(target.to_string()).or_insert(origin);
        if to > *mark {
            *mark = to;
        }
    }

    /// One poll of the store. Store errors are logged and leave the watermark
    /// where it was, so the next tick retries the same range.
    pub async fn tick(&mut self) -> FeedTickOutcome {
        let Some(target) = self.target_rx.borrow().clone() else {
            return FeedTickOutcome::default();
        };

        let after = self.watermark(&target);
        let batch = match self.store.query_newer_than(&target, after).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(website = %target, error = %e, "Change feed query failed. Retrying next tick.");
                return FeedTickOutcome::default();
            }
        };
        let Some(newest) = batch.last().and_then(|r| r.timestamp) else {
            return FeedTickOutcome::default();
        };

        let delivered = batch.len();
        let observers = self.hub.broadcast(FeedEvent::NewCheck(batch));
        self.advance_watermark(&target, newest);
        debug!(website = %target, delivered, observers, watermark = %newest, "Published new checks.");

        let anomaly_raised = match self.detector.check_anomaly(&target).await {
            Ok(Some(signal)) => {
                warn!(website = %target, alert = %signal.message, "Anomaly detected.");
                self.hub.broadcast(FeedEvent::Anomaly(signal));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(website = %target, error = %e, "Anomaly check failed.");
                false
            }
        };

        FeedTickOutcome {
            delivered,
            anomaly_raised,
        }
    }

    /// Spawns the publisher on its own cadence.
    pub fn run(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = self.interval.as_millis() as u64, "Change feed publisher started.");
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}
