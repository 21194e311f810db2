// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! shared between the Pinboard HTTP API and its clients.
//! This module defines the JSON request bodies of the auth endpoints and the
//! push messages delivered over the notification websocket.

use serde::{Deserialize, Serialize};

/// Numeric identifier of a registered user
pub type PrincipalId = i64;

/// An authenticated identity
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    /// Identifier assigned by the user store at registration
    pub id: PrincipalId,
    /// Case-sensitive unique username
    pub username: String,
}

/// Body of `POST /auth/signup`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Body of `POST /auth/login`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Messages pushed from server to a connected websocket client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "msgType")]
pub enum ServerToClient {
    /// The connection is registered under its correlation token
    Connected {
        token: String,
    },
    /// A notification addressed to the principal the connection is bound to
    Notification {
        kind: String,
        payload: serde_json::Value,
    },
    /// The connection was closed because another one took over the token
    Replaced,
    /// Client sent something the server could not parse
    MalformedMessage {
        err_msg: String,
    },
}

/// Messages sent from a websocket client to the server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "msgType")]
pub enum ClientToServer {
    /// Keepalive
    Ping,
}
