//! Sustained-failure detection over the most recent checks of a target.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::models::CheckResult;
use crate::db::store::{CheckStore, StoreError};

/// Number of consecutive DOWN checks that makes an anomaly.
pub const ANOMALY_WINDOW: usize = 3;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AnomalySignal {
    pub message: String,
}

/// True when the window is full and every check in it is DOWN.
pub fn window_is_anomalous(recent: &[CheckResult], window: usize) -> bool {
    window > 0 && recent.len() == window && recent.iter().all(CheckResult::is_down)
}

/// Stateless: it keeps no memory of earlier alerts, so an outage that is
/// still in progress signals again on every evaluation.
#[derive(Clone)]
pub struct AnomalyDetector {
    store: Arc<dyn CheckStore>,
    window: usize,
}

impl AnomalyDetector {
    pub fn new(store: Arc<dyn CheckStore>) -> Self {
        Self {
            store,
            window: ANOMALY_WINDOW,
        }
    }

    pub async fn check_anomaly(&self, target: &str) -> Result<Option<AnomalySignal>, StoreError> {
        let recent = self.store.query_recent(target, self.window).await?;
        if window_is_anomalous(&recent, self.window) {
            Ok(Some(AnomalySignal {
                message: format!("Website {target} is consistently DOWN!"),
            }))
        } else {
            Ok(None)
        }
    }
}
