//! Audit engine RPC — review, OSC progress and OSC cancel.
//!
//! Stateless. No retries happen here; callers decide what to do with a
//! `Transport` failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::GatewayError;
use crate::models::envelope::Envelope;
use crate::models::review::ReviewResult;

/// Operations the gateway needs from the external audit engine.
#[async_trait]
pub trait AuditEngine: Send + Sync {
    /// Review `sql` against `cluster`. Fails with `EmptyResult` on zero rows.
    async fn review(&self, sql: &str, cluster: &str) -> Result<ReviewResult, GatewayError>;

    /// Review in split mode, where mixed DML/DDL statements are expanded into
    /// their executed children.
    async fn review_split(&self, sql: &str, cluster: &str) -> Result<ReviewResult, GatewayError>;

    /// OSC progress for a fingerprint. The engine answers with its own
    /// envelope, including its "no such OSC job" status.
    async fn progress(&self, sqlsha1: &str) -> Result<Envelope, GatewayError>;

    /// Stop the OSC job running for a fingerprint.
    async fn cancel(&self, sqlsha1: &str) -> Result<Envelope, GatewayError>;
}

#[derive(Serialize)]
struct ReviewRequest<'a> {
    sql: &'a str,
    cluster: &'a str,
    split: bool,
}

#[derive(Serialize)]
struct OscRequest<'a> {
    sqlsha1: &'a str,
}

/// JSON-over-HTTP client for the audit engine.
#[derive(Clone)]
pub struct HttpAuditClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAuditClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("sqlgate")
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post_review(&self, sql: &str, cluster: &str, split: bool) -> Result<ReviewResult, GatewayError> {
        let url = format!("{}/review", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&ReviewRequest { sql, cluster, split })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(cluster, split, "Audit engine review failed: {} {}", status, text);
            return Err(GatewayError::Transport(format!("review returned {status}")));
        }

        let rows: ReviewResult = resp.json().await?;
        if rows.is_empty() {
            return Err(GatewayError::EmptyResult);
        }
        tracing::debug!(cluster, split, rows = rows.len(), "Audit engine review completed");
        Ok(rows)
    }

    async fn post_osc(&self, action: &str, sqlsha1: &str) -> Result<Envelope, GatewayError> {
        let url = format!("{}/osc/{action}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&OscRequest { sqlsha1 })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(sqlsha1, "Audit engine OSC {} failed: {} {}", action, status, text);
            return Err(GatewayError::Transport(format!("osc {action} returned {status}")));
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl AuditEngine for HttpAuditClient {
    async fn review(&self, sql: &str, cluster: &str) -> Result<ReviewResult, GatewayError> {
        self.post_review(sql, cluster, false).await
    }

    async fn review_split(&self, sql: &str, cluster: &str) -> Result<ReviewResult, GatewayError> {
        self.post_review(sql, cluster, true).await
    }

    async fn progress(&self, sqlsha1: &str) -> Result<Envelope, GatewayError> {
        self.post_osc("progress", sqlsha1).await
    }

    async fn cancel(&self, sqlsha1: &str) -> Result<Envelope, GatewayError> {
        self.post_osc("stop", sqlsha1).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = HttpAuditClient::new("http://audit:6669/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://audit:6669");
    }

    #[tokio::test]
    async fn unreachable_engine_is_a_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let client = HttpAuditClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.progress("*ABC").await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
