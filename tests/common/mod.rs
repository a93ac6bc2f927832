#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use bodyguard::db::models::{CheckResult, CheckStatus};
use bodyguard::db::MemoryCheckStore;
use bodyguard::server::feed_hub::FeedHub;
use bodyguard::server::monitor_loop::MonitorLoop;
use bodyguard::server::prober::Probe;

/// Hands out queued outcomes in order, then repeats `fallback`.
pub struct ScriptedProbe {
    queue: Mutex<VecDeque<CheckResult>>,
    fallback: CheckResult,
}

impl ScriptedProbe {
    pub fn always_up() -> Self {
        Self::new(Vec::new())
    }

    pub fn new(outcomes: Vec<CheckResult>) -> Self {
        Self {
            queue: Mutex::new(outcomes.into()),
            fallback: CheckResult::responded(
                "",
                CheckStatus::Up,
                200,
                1,
                "Website is running smoothly. Response Time: 1ms",
            ),
        }
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, target: &str) -> CheckResult {
        let next = self.queue.lock().unwrap().pop_front();
        CheckResult {
            target: target.to_string(),
            ..next.unwrap_or_else(|| self.fallback.clone())
        }
    }
}

pub struct TestApp {
    pub store: Arc<MemoryCheckStore>,
    pub monitor: Arc<MonitorLoop>,
    pub feed_hub: FeedHub,
    pub router: Router,
}

pub fn test_app(probe: impl Probe + 'static) -> TestApp {
    let store = Arc::new(MemoryCheckStore::new());
    // Long interval: tests drive ticks explicitly.
    let monitor = Arc::new(MonitorLoop::new(
        Arc::new(probe),
        store.clone(),
        Duration::from_secs(3600),
    ));
    let feed_hub = FeedHub::default();
    let router = bodyguard::web::create_axum_router(monitor.clone(), store.clone(), feed_hub.clone());
    TestApp {
        store,
        monitor,
        feed_hub,
        router,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Polls `condition` for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
