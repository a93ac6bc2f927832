//! Owns the monitored target and drives the probe cadence.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::db::models::CheckResult;
use crate::db::store::CheckStore;
use crate::server::prober::Probe;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(15_000);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MonitorError {
    #[error("URL is required")]
    EmptyTarget,
}

/// Trims the URL and defaults the scheme to https.
pub fn normalize_target(url: &str) -> Result<String, MonitorError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(MonitorError::EmptyTarget);
    }
    if has_scheme(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{trimmed}"))
    }
}

fn has_scheme(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[derive(Default)]
struct MonitorState {
    current_target: Option<String>,
    active_cadence: Option<JoinHandle<()>>,
}

impl MonitorState {
    fn cancel_cadence(&mut self) {
        if let Some(handle) = self.active_cadence.take() {
            handle.abort();
        }
    }
}

/// One probe followed by one append. Store failures are logged and reported
/// as `None`; they never stop the cadence.
async fn probe_and_store(
    probe: &dyn Probe,
    store: &dyn CheckStore,
    target: &str,
) -> Option<CheckResult> {
    let result = probe.probe(target).await;
    match store.append(result).await {
        Ok(stored) => {
            info!(
                website = target,
                status = %stored.status,
                status_code = ?stored.status_code,
                response_time_ms = stored.response_time_ms,
                "Check stored."
            );
            Some(stored)
        }
        Err(e) => {
            error!(website = target, error = %e, "Failed to store check result. Skipping this tick.");
            None
        }
    }
}

/// The single-writer owner of [`MonitorState`].
///
/// `set_target` and `stop` are the only mutators. Cadence replacement happens
/// under the state lock, so a superseded target never gets a new tick; a tick
/// already running when the target changes is left to finish.
pub struct MonitorLoop {
    probe: Arc<dyn Probe>,
    store: Arc<dyn CheckStore>,
    interval: Duration,
    state: Mutex<MonitorState>,
    target_tx: watch::Sender<Option<String>>,
}

impl MonitorLoop {
    pub fn new(probe: Arc<dyn Probe>, store: Arc<dyn CheckStore>, interval: Duration) -> Self {
        let (target_tx, _) = watch::channel(None);
        Self {
            probe,
            store,
            interval,
            state: Mutex::new(MonitorState::default()),
            target_tx,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts monitoring `url`, replacing whatever was monitored before.
    /// Returns the normalized target.
    pub fn set_target(&self, url: &str) -> Result<String, MonitorError> {
        let target = normalize_target(url)?;

        let mut state = self.lock_state();
        if let Some(previous) = state.current_target.as_deref() {
            info!(previous, next = %target, "Superseding monitored target.");
        }
        state.cancel_cadence();
        state.current_target = Some(target.clone());
        self.target_tx.send_replace(Some(target.clone()));
        state.active_cadence = Some(self.spawn_cadence(target.clone()));
        drop(state);

        info!(website = %target, interval_ms = self.interval.as_millis() as u64, "Monitoring started.");
        Ok(target)
    }

    /// Cancels the cadence and returns to idle. Returns the target that was
    /// being monitored, if any.
    pub fn stop(&self) -> Option<String> {
        let mut state = self.lock_state();
        state.cancel_cadence();
        let previous = state.current_target.take();
        self.target_tx.send_replace(None);
        drop(state);

        match &previous {
            Some(target) => info!(website = %target, "Monitoring stopped."),
            None => warn!("Stop requested while idle."),
        }
        previous
    }

    pub fn current_target(&self) -> Option<String> {
        self.lock_state().current_target.clone()
    }

    /// Follows target changes without touching the state lock.
    pub fn subscribe_target(&self) -> watch::Receiver<Option<String>> {
        self.target_tx.subscribe()
    }

    /// Runs one probe-and-store for `target` in the caller's task.
    pub async fn run_tick(&self, target: &str) -> Option<CheckResult> {
        probe_and_store(self.probe.as_ref(), self.store.as_ref(), target).await
    }

    fn spawn_cadence(&self, target: String) -> JoinHandle<()> {
        let probe = Arc::clone(&self.probe);
        let store = Arc::clone(&self.store);
        let period = self.interval;

        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // The first tick completes immediately.
                ticker.tick().await;
                let probe = Arc::clone(&probe);
                let store = Arc::clone(&store);
                let target = target.clone();
                // Each tick is its own task so a hung probe cannot hold back
                // the schedule.
                tokio::spawn(async move {
                    probe_and_store(probe.as_ref(), store.as_ref(), &target).await;
                });
            }
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for MonitorLoop {
    fn drop(&mut self) {
        self.lock_state().cancel_cadence();
    }
}
