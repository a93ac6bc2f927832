use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::web::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(mut socket: WebSocket, app_state: Arc<AppState>) {
    let observer_id = Uuid::new_v4();
    // Subscribe first: anything broadcast from here on reaches this observer.
    let mut rx = app_state.feed_hub.subscribe();
    info!(%observer_id, observers = app_state.feed_hub.observer_count(), "Observer connected to the dashboard feed.");

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let json_data = match serde_json::to_string(&event) {
                            Ok(json_data) => json_data,
                            Err(e) => {
                                warn!(%observer_id, event = event.name(), error = %e, "Failed to serialize feed event.");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(Utf8Bytes::from(json_data))).await.is_err() {
                            debug!(%observer_id, "Send failed. Dropping observer.");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%observer_id, skipped, "Observer fell behind. Skipping missed events.");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(Message::Text(t))) => {
                        if t.as_str() == "ping"
                            && socket.send(Message::Text(Utf8Bytes::from("pong"))).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(p))) => {
                        if socket.send(Message::Pong(p)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%observer_id, error = %e, "WebSocket receive error.");
                        break;
                    }
                }
            }
        }
    }
    info!(%observer_id, "Observer disconnected.");
}
