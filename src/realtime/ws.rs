use crate::db::models::Tally;
use crate::realtime::registry::{ConnectionId, SubscriptionRegistry};
use crate::startup::AppState;
use axum::{
    extract::{
        Extension,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Messages an observer may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { event_id: String },
    Leave { event_id: String },
}

/// Messages pushed to observers.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Update(&'a Tally),
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(app_state): Extension<AppState>,
) -> impl IntoResponse {
    let registry = app_state.broadcaster.registry().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: Arc<SubscriptionRegistry>) {
    let (connection_id, mut updates) = registry.connect().await;
    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(tally) = updates.recv().await {
            let text = match serde_json::to_string(&ServerMessage::Update(&*tally)) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode tally update");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_registry = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    handle_client_message(&recv_registry, connection_id, &text).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.disconnect(connection_id).await;
}

async fn handle_client_message(
    registry: &SubscriptionRegistry,
    connection_id: ConnectionId,
    text: &str,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Join { event_id }) => {
            if registry.join(connection_id, &event_id).await {
                info!(event_id = %event_id, connection_id = %connection_id, "Client joined room");
            }
        }
        Ok(ClientMessage::Leave { event_id }) => {
            if registry.leave(connection_id, &event_id).await {
                debug!(event_id = %event_id, connection_id = %connection_id, "Client left room");
            }
        }
        Err(e) => {
            warn!(connection_id = %connection_id, error = %e, "ignoring malformed client message");
        }
    }
}
