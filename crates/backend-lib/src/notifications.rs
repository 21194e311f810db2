// ============================
// crates/backend-lib/src/notifications.rs
// ============================
//! Push notification routing.
//!
//! A websocket client connects with its CSRF token as correlation token. On
//! every successful register or login the token carried by that request is
//! bound to the principal, so later pushes for the principal find the socket.
use async_trait::async_trait;
use dashmap::DashMap;
use pinboard_common::{PrincipalId, ServerToClient};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// Notification transport seen by the auth facade
#[async_trait]
pub trait ChangeToken: Send + Sync {
    /// Bind `token` to the principal, displacing any previous binding.
    /// `None` clears the binding.
    async fn change_token(
        &self,
        principal_id: PrincipalId,
        token: Option<&str>,
    ) -> Result<(), AppError>;
}

struct Connection {
    id: Uuid,
    tx: mpsc::Sender<ServerToClient>,
}

/// Live websocket connections keyed by correlation token, and the
/// principal → token bindings
#[derive(Default)]
pub struct NotificationHub {
    connections: DashMap<String, Connection>,
    bindings: DashMap<PrincipalId, String>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under `token`. A connection already holding the
    /// token is told it was replaced and dropped from the hub.
    pub fn register(&self, token: &str, tx: mpsc::Sender<ServerToClient>) -> Uuid {
        let id = Uuid::new_v4();
        if let Some(previous) = self.connections.insert(token.to_string(), Connection { id, tx }) {
            // the old socket may already be gone
            let _ = previous.tx.try_send(ServerToClient::Replaced);
            debug!(connection = %previous.id, "replaced websocket connection");
        }
        id
    }

    /// Remove the connection, unless another one took the token over since
    pub fn unregister(&self, token: &str, id: Uuid) {
        self.connections.remove_if(token, |_, conn| conn.id == id);
    }

    pub fn bound_token(&self, principal_id: PrincipalId) -> Option<String> {
        self.bindings.get(&principal_id).map(|t| t.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Push a notification to the principal's bound connection.
    /// Returns `false` when no live connection is bound.
    pub async fn notify(
        &self,
        principal_id: PrincipalId,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<bool, AppError> {
        let Some(token) = self.bound_token(principal_id) else {
            return Ok(false);
        };
        // clone the sender so no map guard is held across the send
        let Some(tx) = self.connections.get(&token).map(|c| c.tx.clone()) else {
            return Ok(false);
        };
        let msg = ServerToClient::Notification {
            kind: kind.to_string(),
            payload,
        };
        Ok(tx.send(msg).await.is_ok())
    }
}

#[async_trait]
impl ChangeToken for NotificationHub {
    async fn change_token(
        &self,
        principal_id: PrincipalId,
        token: Option<&str>,
    ) -> Result<(), AppError> {
        match token {
            Some(token) => {
                // a token routes to one principal only
                self.bindings
                    .retain(|id, bound| *id == principal_id || bound != token);
                self.bindings.insert(principal_id, token.to_string());
            },
            None => {
                self.bindings.remove(&principal_id);
            },
        }
        debug!(principal_id, bound = token.is_some(), "notification token changed");
        Ok(())
    }
}
