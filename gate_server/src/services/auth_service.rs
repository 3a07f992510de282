//! Login: Django password verification and the failed-login lockout counter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashMap;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use hmac::Hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::GatewayError;
use crate::models::envelope::Envelope;
use crate::models::user::User;
use crate::schema::sql_users;
use crate::services::workflow_store::PgPool;

/// Verify `password` against a Django `pbkdf2_sha256$<iter>$<salt>$<hash>` string.
pub fn verify_django_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.splitn(4, '$');
    let (Some("pbkdf2_sha256"), Some(iterations), Some(salt), Some(hash)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(hash) else {
        return false;
    };
    match pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), iterations) {
        Some(derived) => derived[..].ct_eq(&expected[..]).into(),
        None => false,
    }
}

/// PBKDF2-HMAC-SHA256 with Django's 32-byte key length.
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> Option<[u8; 32]> {
    if iterations == 0 {
        return None;
    }
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut key).ok()?;
    Some(key)
}

#[derive(Debug, Clone, Copy)]
struct FailureRecord {
    count: u32,
    last_failure: Instant,
}

/// Counts consecutive failed logins per username.
///
/// An account with `threshold` failures is locked until `window` has passed
/// since its last failure. A failure after the window restarts the count.
#[derive(Clone)]
pub struct LoginGuard {
    failures: Arc<DashMap<String, FailureRecord>>,
    threshold: u32,
    window: Duration,
}

impl LoginGuard {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            failures: Arc::new(DashMap::new()),
            threshold,
            window,
        }
    }

    pub fn is_locked(&self, username: &str, now: Instant) -> bool {
        self.failures
            .get(username)
            .map(|r| r.count >= self.threshold && now.saturating_duration_since(r.last_failure) <= self.window)
            .unwrap_or(false)
    }

    pub fn record_failure(&self, username: &str, now: Instant) {
        let mut entry = self
            .failures
            .entry(username.to_string())
            .or_insert(FailureRecord { count: 0, last_failure: now });
        if entry.count > 0 && now.saturating_duration_since(entry.last_failure) > self.window {
            entry.count = 1;
        } else {
            entry.count += 1;
        }
        entry.last_failure = now;
    }

    pub fn clear(&self, username: &str) {
        self.failures.remove(username);
    }

    pub fn failures(&self, username: &str) -> u32 {
        self.failures.get(username).map(|r| r.count).unwrap_or(0)
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Source of stored password hashes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn password_hash(&self, username: &str) -> anyhow::Result<Option<String>>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn password_hash(&self, username: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("diesel pool: {e}"))?;
        let user = sql_users::table
            .filter(sql_users::username.eq(username))
            .filter(sql_users::is_active.eq(true))
            .select(User::as_select())
            .first::<User>(&mut *conn)
            .await
            .optional()?;
        Ok(user.map(|u| u.password))
    }
}

/// Username → Django hash, for tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    users: Arc<DashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, username: &str, encoded_password: &str) {
        self.users.insert(username.to_string(), encoded_password.to_string());
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn password_hash(&self, username: &str) -> anyhow::Result<Option<String>> {
        Ok(self.users.get(username).map(|r| r.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Ok,
    WrongPassword,
    EmptyCredentials,
    Locked,
    UnknownUser,
}

impl LoginOutcome {
    pub fn status(&self) -> i64 {
        match self {
            LoginOutcome::Ok => 0,
            LoginOutcome::WrongPassword => 1,
            LoginOutcome::EmptyCredentials => 2,
            LoginOutcome::Locked => 3,
            LoginOutcome::UnknownUser => 4,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LoginOutcome::Ok => "ok",
            LoginOutcome::WrongPassword => "wrong_password",
            LoginOutcome::EmptyCredentials => "empty",
            LoginOutcome::Locked => "locked",
            LoginOutcome::UnknownUser => "unknown_user",
        }
    }

    pub fn into_envelope(self, lock_window: Duration) -> Envelope {
        let msg = match self {
            LoginOutcome::Ok => return Envelope::ok(""),
            LoginOutcome::WrongPassword => "wrong username or password, try again".to_string(),
            LoginOutcome::EmptyCredentials => "username or password is empty".to_string(),
            LoginOutcome::Locked => format!(
                "too many failed logins, the account is locked for {} minutes",
                lock_window.as_secs().div_ceil(60)
            ),
            LoginOutcome::UnknownUser => "user does not exist".to_string(),
        };
        Envelope::failure(self.status(), msg)
    }
}

#[derive(Clone)]
pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    guard: LoginGuard,
}

impl Authenticator {
    pub fn new(credentials: Arc<dyn CredentialStore>, guard: LoginGuard) -> Self {
        Self { credentials, guard }
    }

    pub fn guard(&self) -> &LoginGuard {
        &self.guard
    }

    pub async fn authenticate(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoginOutcome, GatewayError> {
        let outcome = self.check(username, password, Instant::now()).await?;
        crate::metrics::login_attempt(outcome.label());
        if outcome != LoginOutcome::Ok {
            tracing::info!(username = username.unwrap_or(""), outcome = outcome.label(), "Login rejected");
        }
        Ok(outcome)
    }

    async fn check(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        now: Instant,
    ) -> Result<LoginOutcome, GatewayError> {
        let (Some(username), Some(password)) = (username, password) else {
            return Ok(LoginOutcome::EmptyCredentials);
        };
        if username.is_empty() || password.is_empty() {
            return Ok(LoginOutcome::EmptyCredentials);
        }
        if self.guard.is_locked(username, now) {
            return Ok(LoginOutcome::Locked);
        }

        let stored = self
            .credentials
            .password_hash(username)
            .await
            .map_err(GatewayError::Storage)?;
        let Some(stored) = stored else {
            return Ok(LoginOutcome::UnknownUser);
        };

        // Django's iteration counts make this CPU-bound.
        let candidate = password.to_string();
        let verified = tokio::task::spawn_blocking(move || verify_django_password(&candidate, &stored))
            .await
            .map_err(|e| GatewayError::Storage(anyhow::anyhow!("password verification task: {e}")))?;
        if verified {
            self.guard.clear(username);
            Ok(LoginOutcome::Ok)
        } else {
            self.guard.record_failure(username, now);
            Ok(LoginOutcome::WrongPassword)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_django_password(password: &str, salt: &str, iterations: u32) -> Option<String> {
        let key = pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), iterations)?;
        Some(format!("pbkdf2_sha256${iterations}${salt}${}", STANDARD.encode(key)))
    }

    #[test]
    fn pbkdf2_matches_rfc7914_vector() {
        let key = pbkdf2_sha256(b"passwd", b"salt", 1).unwrap();
        let expected: [u8; 32] = [
            0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f, 0xec, 0x16, 0x91, 0xc2, 0x25, 0x44,
            0xb6, 0x05, 0xf9, 0x41, 0x85, 0x21, 0x6d, 0xde, 0x04, 0x65, 0xe6, 0x8b, 0x9d, 0x57,
            0xc2, 0x0d, 0xac, 0xbc,
        ];
        assert_eq!(key, expected);
    }

    #[test]
    fn django_hash_verifies_only_the_right_password() {
        let encoded = make_django_password("s3cret", "NaCl", 1000).unwrap();
        assert!(encoded.starts_with("pbkdf2_sha256$1000$NaCl$"));
        assert!(verify_django_password("s3cret", &encoded));
        assert!(!verify_django_password("s3cret!", &encoded));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_django_password("x", ""));
        assert!(!verify_django_password("x", "md5$1$salt$abc"));
        assert!(!verify_django_password("x", "pbkdf2_sha256$zero$salt$abc"));
        assert!(!verify_django_password("x", "pbkdf2_sha256$0$salt$abc"));
        assert!(!verify_django_password("x", "pbkdf2_sha256$10$salt$***"));
    }

    #[test]
    fn hash_produced_by_django_verifies() {
        let encoded = "pbkdf2_sha256$50$pepper$176q3NuUOGoKzipyGPbRfmBJ5UEB+sqy2cRcev9R3i4=";
        assert!(verify_django_password("hunter2", encoded));
        assert!(!verify_django_password("hunter3", encoded));
    }

    #[test]
    fn truncated_hash_never_verifies() {
        let encoded = make_django_password("s3cret", "NaCl", 10).unwrap();
        let (head, hash) = encoded.rsplit_once('$').unwrap();
        let key = STANDARD.decode(hash).unwrap();
        let truncated = format!("{head}${}", STANDARD.encode(&key[..16]));
        assert!(!verify_django_password("s3cret", &truncated));
    }

    #[test]
    fn guard_locks_after_threshold_within_window() {
        let guard = LoginGuard::new(3, Duration::from_secs(300));
        let t0 = Instant::now();
        for i in 0..3 {
            assert!(!guard.is_locked("bob", t0));
            guard.record_failure("bob", t0 + Duration::from_secs(i));
        }
        assert!(guard.is_locked("bob", t0 + Duration::from_secs(10)));
        assert!(!guard.is_locked("bob", t0 + Duration::from_secs(400)));
        assert!(!guard.is_locked("alice", t0));
    }

    #[test]
    fn failure_after_window_restarts_count() {
        let guard = LoginGuard::new(3, Duration::from_secs(300));
        let t0 = Instant::now();
        guard.record_failure("bob", t0);
        guard.record_failure("bob", t0 + Duration::from_secs(1));
        assert_eq!(guard.failures("bob"), 2);
        guard.record_failure("bob", t0 + Duration::from_secs(600));
        assert_eq!(guard.failures("bob"), 1);
        guard.clear("bob");
        assert_eq!(guard.failures("bob"), 0);
    }

    fn authenticator(threshold: u32) -> Authenticator {
        let store = MemoryCredentialStore::new();
        store.put("bob", &make_django_password("hunter2", "salt", 10).unwrap());
        Authenticator::new(Arc::new(store), LoginGuard::new(threshold, Duration::from_secs(300)))
    }

    #[tokio::test]
    async fn authenticate_outcomes() {
        let auth = authenticator(5);
        assert_eq!(auth.authenticate(Some(""), Some("x")).await.unwrap(), LoginOutcome::EmptyCredentials);
        assert_eq!(auth.authenticate(None, None).await.unwrap(), LoginOutcome::EmptyCredentials);
        assert_eq!(auth.authenticate(Some("zoe"), Some("x")).await.unwrap(), LoginOutcome::UnknownUser);
        assert_eq!(auth.authenticate(Some("bob"), Some("nope")).await.unwrap(), LoginOutcome::WrongPassword);
        assert_eq!(auth.guard().failures("bob"), 1);
        assert_eq!(auth.authenticate(Some("bob"), Some("hunter2")).await.unwrap(), LoginOutcome::Ok);
        assert_eq!(auth.guard().failures("bob"), 0);
    }

    #[tokio::test]
    async fn locked_account_rejects_even_correct_password() {
        let auth = authenticator(2);
        auth.authenticate(Some("bob"), Some("a")).await.unwrap();
        auth.authenticate(Some("bob"), Some("b")).await.unwrap();
        assert_eq!(auth.authenticate(Some("bob"), Some("hunter2")).await.unwrap(), LoginOutcome::Locked);
    }

    #[test]
    fn locked_message_reports_minutes() {
        let env = LoginOutcome::Locked.into_envelope(Duration::from_secs(300));
        assert_eq!(env.status, 3);
        assert!(env.msg.contains("5 minutes"));
    }
}
