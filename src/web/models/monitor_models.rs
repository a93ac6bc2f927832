use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Default)]
pub struct StartMonitoringRequest {
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MonitoringStatusResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MonitorOverview {
    pub target: Option<String>,
    pub observers: usize,
    pub probe_interval_ms: u64,
}

#[derive(Deserialize, Debug, Default)]
pub struct CheckHistoryQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}
