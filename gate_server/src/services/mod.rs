//! Gateway services — audit engine access, fingerprint recovery and the
//! operations built on them.

pub mod audit_client;
pub mod auth_service;
pub mod fingerprint_cache;
pub mod orchestrator;
pub mod reconciler;
pub mod session;
pub mod workflow_store;
