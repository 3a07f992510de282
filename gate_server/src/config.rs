//! Gateway configuration — loaded from environment variables.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct GateConfig {
    /// Base URL of the external audit engine.
    pub audit_url: String,
    /// Timeout applied to every audit engine call.
    pub audit_timeout_secs: u64,
    /// Timeout applied to a whole HTTP request.
    pub request_timeout_secs: u64,
    /// Re-run the audit in split mode when recovering fingerprints.
    pub split_reconcile: bool,
    /// Consecutive login failures before an account is locked.
    pub login_lock_count: u32,
    /// Lock window in seconds.
    pub login_lock_secs: u64,
    /// Lifetime of a login session in seconds.
    pub session_ttl_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            audit_url: "http://127.0.0.1:6669".to_string(),
            audit_timeout_secs: 30,
            request_timeout_secs: 60,
            split_reconcile: false,
            login_lock_count: 5,
            login_lock_secs: 300,
            session_ttl_secs: 14 * 24 * 60 * 60,
        }
    }
}

impl GateConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let audit_url = std::env::var("GATE_AUDIT_URL").unwrap_or_default();
        let audit_timeout_secs = std::env::var("GATE_AUDIT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.audit_timeout_secs);
        let request_timeout_secs = std::env::var("GATE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);
        let split_reconcile = std::env::var("GATE_SPLIT_RECONCILE")
            .ok()
            .map(|s| parse_flag(&s))
            .unwrap_or(defaults.split_reconcile);
        let login_lock_count = std::env::var("GATE_LOGIN_LOCK_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.login_lock_count);
        let login_lock_secs = std::env::var("GATE_LOGIN_LOCK_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.login_lock_secs);
        let session_ttl_secs = std::env::var("GATE_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.session_ttl_secs);

        let audit_url = if audit_url.is_empty() {
            tracing::warn!(
                "GATE_AUDIT_URL not set -- using {} for the audit engine",
                defaults.audit_url
            );
            defaults.audit_url
        } else {
            audit_url
        };
        if split_reconcile {
            tracing::info!("Split reconciliation enabled -- fingerprint lookups re-run the audit");
        }

        Self {
            audit_url,
            audit_timeout_secs,
            request_timeout_secs,
            split_reconcile,
            login_lock_count,
            login_lock_secs,
            session_ttl_secs,
        }
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn login_lock_window(&self) -> Duration {
        Duration::from_secs(self.login_lock_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing_accepts_common_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn defaults_keep_split_reconcile_off() {
        let config = GateConfig::default();
        assert!(!config.split_reconcile);
        assert_eq!(config.login_lock_count, 5);
        assert_eq!(config.login_lock_window(), Duration::from_secs(300));
        assert_eq!(config.session_ttl(), crate::services::session::DEFAULT_SESSION_TTL);
    }
}
