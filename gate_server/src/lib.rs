//! SQL change-management gateway.
//!
//! Engineers submit SQL, the gateway hands it to the external audit engine for
//! automated review and tracks the resulting workflow. Statements the engine
//! executed through online schema change (OSC) carry a content fingerprint;
//! the gateway recovers that fingerprint per statement and uses it to report
//! OSC progress and to cancel a running OSC job.

pub mod config;
pub mod dashboard;
pub mod errors;
pub mod metrics;
pub mod migration;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
