use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::info;

use crate::db::models::CheckResult;
use crate::web::models::monitor_models::{
    CheckHistoryQuery, MonitorOverview, MonitoringStatusResponse, StartMonitoringRequest,
};
use crate::web::{AppError, AppState};

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 1000;

pub fn create_monitor_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/start-monitoring", post(start_monitoring))
        .route("/api/stop-monitoring", post(stop_monitoring))
        .route("/api/status", get(get_status))
        .route("/api/checks", get(get_checks))
}

#[axum::debug_handler]
async fn start_monitoring(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<StartMonitoringRequest>, JsonRejection>,
) -> Result<Json<MonitoringStatusResponse>, AppError> {
    let Json(request) = payload?;
    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("URL is required".to_string()))?;

    info!(url = %url, "New monitoring request.");
    let target = app_state.monitor.set_target(&url)?;

    Ok(Json(MonitoringStatusResponse {
        status: format!("Monitoring started for {target}"),
    }))
}

#[axum::debug_handler]
async fn stop_monitoring(
    State(app_state): State<Arc<AppState>>,
) -> Json<MonitoringStatusResponse> {
    let status = match app_state.monitor.stop() {
        Some(target) => format!("Monitoring stopped for {target}"),
        None => "Nothing was being monitored".to_string(),
    };
    Json(MonitoringStatusResponse { status })
}

#[axum::debug_handler]
async fn get_status(State(app_state): State<Arc<AppState>>) -> Json<MonitorOverview> {
    Json(MonitorOverview {
        target: app_state.monitor.current_target(),
        observers: app_state.feed_hub.observer_count(),
        probe_interval_ms: app_state.monitor.interval().as_millis() as u64,
    })
}

/// Stored checks of the current target. A time window returns oldest first;
/// without one the newest `limit` checks are returned, newest first.
#[axum::debug_handler]
async fn get_checks(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CheckHistoryQuery>,
) -> Result<Json<Vec<CheckResult>>, AppError> {
    let target = app_state
        .monitor
        .current_target()
        .ok_or_else(|| AppError::InvalidInput("No website is being monitored".to_string()))?;

    let records = if query.start_time.is_some() || query.end_time.is_some() {
        let limit = query.limit.map(|l| l.min(MAX_HISTORY_LIMIT));
        app_state
            .store
            .query_range(&target, query.start_time, query.end_time, limit)
            .await?
    } else {
        let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
        app_state.store.query_recent(&target, limit).await?
    };
    Ok(Json(records))
}
