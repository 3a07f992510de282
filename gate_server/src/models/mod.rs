//! Gateway data models.

pub mod envelope;
pub mod review;
pub mod user;
pub mod workflow;
