use serde::{Deserialize, Serialize};

use crate::alerting::anomaly_detector::AnomalySignal;
use crate::db::models::CheckResult;

/// A push event as delivered to dashboard observers.
///
/// Serialized as `{"event": "<name>", "payload": ...}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum FeedEvent {
    /// Every record stored since the previous delivery, oldest first.
    #[serde(rename = "newCheck")]
    NewCheck(Vec<CheckResult>),
    #[serde(rename = "anomaly")]
    Anomaly(AnomalySignal),
}

impl FeedEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FeedEvent::NewCheck(_) => "newCheck",
            FeedEvent::Anomaly(_) => "anomaly",
        }
    }
}
