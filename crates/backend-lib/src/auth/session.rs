// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session store: opaque token → authenticated principal.
use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::{counter, gauge};
use pinboard_common::{Principal, PrincipalId};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED, SESSION_REVOKED};

/// Session information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// CSRF token bound to this session
    pub csrf_token: String,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session token already in use")]
    Collision,
    #[error("no such session")]
    Missing,
    #[error("session expired")]
    Expired,
}

/// Session manager for handling authentication tokens.
///
/// Cloning is cheap and every clone sees the same sessions. Operations on a
/// single token are linearizable: once `put` returns, any `get` for that
/// token observes it; once `delete` returns, any `get` reports `Missing`.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session. A live session with the same token is a
    /// collision and the caller must mint a new token; an expired one is
    /// replaced.
    pub fn put(&self, session: Session) -> Result<(), SessionError> {
        let now = Utc::now();
        match self.sessions.entry(session.token.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired_at(now) {
                    return Err(SessionError::Collision);
                }
                occupied.insert(session);
            },
            Entry::Vacant(vacant) => {
                vacant.insert(session);
            },
        }

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        Ok(())
    }

    /// Look up a session. Expired entries are reported as `Expired` and
    /// removed on the way out.
    pub fn get(&self, token: &str) -> Result<Session, SessionError> {
        let now = Utc::now();
        match self.sessions.get(token) {
            None => return Err(SessionError::Missing),
            Some(session) if !session.is_expired_at(now) => return Ok(session.clone()),
            Some(_) => {},
        }

        if self
            .sessions
            .remove_if(token, |_, session| session.is_expired_at(now))
            .is_some()
        {
            counter!(SESSION_EXPIRED).increment(1);
            gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        }
        Err(SessionError::Expired)
    }

    /// Remove a session. Removing an absent token is not an error; the
    /// return value says whether anything was removed.
    pub fn delete(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token).is_some();
        if removed {
            counter!(SESSION_REVOKED).increment(1);
            gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        }
        removed
    }

    /// Remove every session belonging to a principal
    pub fn delete_for_principal(&self, principal_id: PrincipalId) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = session.principal.id != principal_id;
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            counter!(SESSION_REVOKED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        }
        removed
    }

    /// CSRF token bound to a live session
    pub fn csrf_token(&self, token: &str) -> Option<String> {
        self.get(token).ok().map(|session| session.csrf_token)
    }

    /// Number of stored sessions, expired ones not yet swept included
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop every expired session
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before_count = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        let after_count = self.sessions.len();
        let removed = before_count.saturating_sub(after_count);

        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(after_count as f64);
        }
        removed
    }

    /// Periodically sweep expired sessions in the background
    pub fn spawn_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = manager.cleanup_expired();
                debug!(removed, "swept expired sessions");
            }
        })
    }
}
