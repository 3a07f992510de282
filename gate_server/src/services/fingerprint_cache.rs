//! Per-workflow fingerprint maps, shared across requests.
//!
//! Entries never expire: a workflow is reviewed once at creation, so the
//! fingerprints recovered for it are immutable for its lifetime.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

/// Sequence id → OSC fingerprint.
pub type FingerprintMap = BTreeMap<i64, String>;

/// Concurrent workflow id → `FingerprintMap` cache.
///
/// Cloning shares the underlying map. Concurrent first-population for the same
/// workflow is allowed; the last insert wins and both writers hold equal maps.
#[derive(Clone, Default)]
pub struct FingerprintCache {
    entries: Arc<DashMap<i64, FingerprintMap>>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloned snapshot of a workflow's map.
    pub fn get(&self, workflow_id: i64) -> Option<FingerprintMap> {
        self.entries.get(&workflow_id).map(|r| r.clone())
    }

    /// Store a map. Empty maps are not cached.
    pub fn insert(&self, workflow_id: i64, map: FingerprintMap) {
        if map.is_empty() {
            return;
        }
        self.entries.insert(workflow_id, map);
    }

    pub fn contains(&self, workflow_id: i64) -> bool {
        self.entries.contains_key(&workflow_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
