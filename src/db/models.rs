use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a single probe.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Up,
    Slow,
    Down,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Up => "UP",
            CheckStatus::Slow => "SLOW",
            CheckStatus::Down => "DOWN",
            CheckStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(CheckStatus::Up),
            "SLOW" => Ok(CheckStatus::Slow),
            "DOWN" => Ok(CheckStatus::Down),
            "ERROR" => Ok(CheckStatus::Error),
            other => Err(format!("unknown check status '{other}'")),
        }
    }
}

/// One probe outcome, as stored and as pushed to observers.
///
/// `timestamp` is `None` only before the record reaches the store, which
/// assigns it at append time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub target: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CheckResult {
    /// A probe that received an HTTP response (UP or SLOW).
    pub fn responded(
        target: impl Into<String>,
        status: CheckStatus,
        status_code: u16,
        response_time_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            status,
            status_code: Some(status_code),
            response_time_ms,
            message: message.into(),
            timestamp: None,
        }
    }

    /// A probe that never got a response. DOWN and ERROR carry no status code.
    pub fn failed(
        target: impl Into<String>,
        status: CheckStatus,
        response_time_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            status,
            status_code: None,
            response_time_ms,
            message: message.into(),
            timestamp: None,
        }
    }

    pub fn is_down(&self) -> bool {
        self.status == CheckStatus::Down
    }
}
