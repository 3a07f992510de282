//! Failure taxonomy for gateway operations.
//!
//! Every variant is recovered at the route boundary and rendered into the
//! `{"status","msg","data"}` envelope; none of them reaches the transport
//! layer as a fault.

use std::time::Duration;

use thiserror::Error;

/// Envelope status for a parameter or precondition failure.
pub const STATUS_PARAM_ERROR: i64 = -1;
/// Envelope status for a generic domain failure.
pub const STATUS_FAILED: i64 = 1;
/// Envelope status when the workflow does not exist.
pub const STATUS_NOT_FOUND: i64 = 2;
/// Envelope status when the statement was not executed through OSC.
pub const STATUS_NOT_OSC: i64 = 4;
/// Envelope status for an unreachable or misbehaving audit engine.
pub const STATUS_TRANSPORT: i64 = 5;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    MalformedInput(String),

    #[error("audit engine returned an empty result set, the SQL probably has a syntax error")]
    EmptyResult,

    #[error("audit engine request failed: {0}")]
    Transport(String),

    #[error("request did not finish within {0:?}, try again later")]
    Timeout(Duration),

    #[error("workflow {id} not found")]
    NotFound { id: i64 },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl GatewayError {
    /// Envelope status code for this failure on the OSC endpoints.
    pub fn envelope_status(&self) -> i64 {
        match self {
            GatewayError::MissingParameter(_)
            | GatewayError::MalformedInput(_)
            | GatewayError::Forbidden(_)
            | GatewayError::InvalidState(_) => STATUS_PARAM_ERROR,
            GatewayError::EmptyResult | GatewayError::Storage(_) => STATUS_FAILED,
            GatewayError::NotFound { .. } => STATUS_NOT_FOUND,
            GatewayError::Transport(_) | GatewayError::Timeout(_) => STATUS_TRANSPORT,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}
