//! Session store and the single-admin auth gate.
//!
//! Sessions live only in memory and are gone when the process exits.
//! The store sits behind [`SessionStore`] so the gate can be driven by any
//! backing map, including test doubles.

use crate::config::AuthConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// A logged-in session
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Key-value store for sessions
pub trait SessionStore {
    fn get(&self, id: &str) -> Option<Session>;
    fn set(&self, session: Session);
    /// Remove a session; returns whether one existed
    fn expire(&self, id: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &str) -> Option<Session> {
        self.sessions().get(id).cloned()
    }

    fn set(&self, session: Session) {
        self.sessions().insert(session.id.clone(), session);
    }

    fn expire(&self, id: &str) -> bool {
        self.sessions().remove(id).is_some()
    }
}

/// Checks credentials against the configured admin and issues sessions
pub struct Authenticator<S: SessionStore> {
    store: S,
    config: AuthConfig,
}

impl<S: SessionStore> Authenticator<S> {
    pub fn new(store: S, config: AuthConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a session, or `None` if the credentials don't match
    pub fn login(&self, username: &str, password: &str, remember_me: bool) -> Option<Session> {
        self.login_at(username, password, remember_me, Utc::now())
    }

    pub fn login_at(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
        now: DateTime<Utc>,
    ) -> Option<Session> {
        if username != self.config.username || password != self.config.password {
            tracing::warn!("Rejected login for {:?}", username);
            return None;
        }

        let lifetime = if remember_me {
            Duration::days(self.config.remember_me_days)
        } else {
            Duration::hours(self.config.session_hours)
        };
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            username: username.to_string(),
            expires_at: now + lifetime,
        };
        self.store.set(session.clone());
        tracing::debug!("Session started for {}", username);
        Some(session)
    }

    /// Whether `session_id` names a live session
    pub fn is_authenticated(&self, session_id: &str) -> bool {
        self.is_authenticated_at(session_id, Utc::now())
    }

    pub fn is_authenticated_at(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        let Some(session) = self.store.get(session_id) else {
            return false;
        };
        if session.is_expired_at(now) {
            self.store.expire(session_id);
            tracing::debug!("Session for {} expired", session.username);
            return false;
        }
        true
    }

    pub fn logout(&self, session_id: &str) -> bool {
        self.store.expire(session_id)
    }
}
