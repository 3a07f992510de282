//! Recover per-statement OSC fingerprints from two review results.
//!
//! The initial review is captured at submission. The split review expands a
//! statement that mixes DML and DDL into its executed children, and only the
//! split rows carry the fingerprints the engine actually uses. Splitting
//! inserts rows but never removes or reorders them, so the children of
//! original statement `id` start at split index `id - 1` or later.

use crate::models::review::ReviewRow;
use crate::services::fingerprint_cache::FingerprintMap;

/// Map each original sequence id to the fingerprint of its OSC statement.
///
/// Ids with no matching fingerprint are absent from the result.
pub fn reconcile(initial: &[ReviewRow], split: &[ReviewRow]) -> FingerprintMap {
    if initial == split {
        return initial
            .iter()
            .filter(|row| row.has_fingerprint())
            .map(|row| (row.id, row.sqlsha1.clone()))
            .collect();
    }

    let mut map = FingerprintMap::new();
    for row in initial.iter().filter(|row| row.has_fingerprint()) {
        let Some(anchor) = scan_anchor(row.id) else {
            continue;
        };
        let found = split
            .iter()
            .skip(anchor)
            .filter(|candidate| candidate.has_fingerprint())
            .find(|candidate| candidate.sql == row.sql && candidate.backup_dbname == row.backup_dbname);
        if let Some(candidate) = found {
            map.insert(row.id, candidate.sqlsha1.clone());
        }
    }
    map
}

fn scan_anchor(id: i64) -> Option<usize> {
    usize::try_from(id.checked_sub(1)?).ok()
}
