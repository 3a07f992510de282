//! Logged-in sessions, keyed by an opaque cookie token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use dashmap::DashMap;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sessionid";

/// Django's `SESSION_COOKIE_AGE`: two weeks.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Session {
    username: String,
    created: Instant,
}

/// Token → username map. A session expires `ttl` after login.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session for `username` and return its token.
    pub fn create(&self, username: &str) -> String {
        self.create_at(username, Instant::now())
    }

    fn create_at(&self, username: &str, now: Instant) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                created: now,
            },
        );
        token
    }

    pub fn username(&self, token: &str) -> Option<String> {
        self.username_at(token, Instant::now())
    }

    fn username_at(&self, token: &str, now: Instant) -> Option<String> {
        let username = {
            let session = self.sessions.get(token)?;
            if !self.is_expired(&session, now) {
                return Some(session.username.clone());
            }
            session.username.clone()
        };
        self.sessions.remove(token);
        tracing::debug!(username = %username, "Session expired");
        None
    }

    pub fn remove(&self, token: &str) {
        self.sessions.remove(token);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn vacuum(&self) -> usize {
        self.vacuum_at(Instant::now())
    }

    fn vacuum_at(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.is_expired(session, now));
        before.saturating_sub(self.sessions.len())
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.created) >= self.ttl
    }

    /// Session token carried by the request's cookie header.
    pub fn token(headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, token)| token.to_string())
    }

    /// Resolve the acting user from the request's session cookie.
    pub fn actor(&self, headers: &HeaderMap) -> Option<String> {
        Self::token(headers).and_then(|token| self.username(&token))
    }

    /// `Set-Cookie` value for a fresh session token.
    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.ttl.as_secs()
        )
    }

    /// `Set-Cookie` value that clears the session cookie.
    pub fn expired_cookie() -> String {
        format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
    }
}

/// Sweep expired sessions every `interval` for the life of the process.
pub fn spawn_vacuum_task(store: SessionStore, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = store.vacuum();
            if removed > 0 {
                tracing::debug!(removed, remaining = store.len(), "Expired sessions removed");
            }
        }
    })
}
