// ==================
// crates/backend-lib/src/websocket.rs
// ==================
//! Notification websocket.
//!
//! A client connects to `/ws?token=<csrf token>` and stays registered in the
//! notification hub under that token until it disconnects or another
//! connection takes the token over. The server only pushes; client frames
//! other than `Ping` are answered with `MalformedMessage`.
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use pinboard_common::{ClientToServer, ServerToClient};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{auth::csrf::MAX_CSRF_TOKEN_LEN, error::AppError, metrics::{WS_ACTIVE, WS_CONNECTION}, AppState};

/// Outbound messages buffered per connection
const OUTBOUND_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Handler for websocket upgrades
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = params
        .token
        .filter(|t| !t.is_empty() && t.len() <= MAX_CSRF_TOKEN_LEN)
        .ok_or_else(|| AppError::Invalid("missing or oversized token".to_string()))?;

    counter!(WS_CONNECTION).increment(1);
    Ok(ws
        .on_upgrade(move |socket| handle_connection(socket, state, token))
        .into_response())
}

async fn handle_connection(socket: WebSocket, state: AppState, token: String) {
    gauge!(WS_ACTIVE).increment(1.0);
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerToClient>(OUTBOUND_BUFFER);

    let id = state.notifications.register(&token, tx.clone());
    debug!(connection = %id, "websocket connected");

    // Forward hub messages to the socket; `Replaced` ends the connection
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let replaced = msg == ServerToClient::Replaced;
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to serialize push message");
                    continue;
                },
            };
            if sink.send(Message::Text(json.into())).await.is_err() || replaced {
                break;
            }
        }
        let _ = sink.close().await;
    });

    if tx
        .send(ServerToClient::Connected {
            token: token.clone(),
        })
        .await
        .is_err()
    {
        debug!(connection = %id, "websocket closed before greeting");
    }

    while let Some(Ok(message)) = stream.next().await {
        if send_task.is_finished() {
            break;
        }
        match message {
            Message::Text(text) => {
                if let Err(e) = serde_json::from_str::<ClientToServer>(&text) {
                    let reply = ServerToClient::MalformedMessage {
                        err_msg: e.to_string(),
                    };
                    if tx.send(reply).await.is_err() {
                        break;
                    }
                }
            },
            Message::Close(_) => break,
            _ => {},
        }
    }

    state.notifications.unregister(&token, id);
    send_task.abort();
    gauge!(WS_ACTIVE).decrement(1.0);
    debug!(connection = %id, "websocket disconnected");
}
