//! Memoizing resolve layer.
//!
//! Rebuilding is deterministic for a given capture point, so repeat requests
//! for the same [`CaptureId`] return the cached `(commands, ranges)` pair
//! without re-running the engine. Distinct capture ids resolve
//! independently; see the concurrency notes on [`rebuild_state`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use prism_capture::{CaptureId, Snapshot};
use tracing::debug;

use crate::orchestrator::{rebuild_state, Rebuild, RebuildOptions};
use crate::report::RebuildError;

#[derive(Default)]
pub struct InitialCommands {
    cache: Mutex<HashMap<CaptureId, Arc<Rebuild>>>,
}

impl InitialCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// The initial commands for `capture`, rebuilding on first request and
    /// serving the memoized result afterwards.
    pub fn resolve(
        &self,
        capture: CaptureId,
        snapshot: &Snapshot,
        opts: &RebuildOptions,
    ) -> Result<Arc<Rebuild>, RebuildError> {
        if let Some(hit) = self.lookup(capture) {
            debug!(?capture, "initial commands served from cache");
            return Ok(hit);
        }

        // The rebuild runs outside the lock: a cancellation or a slow
        // rebuild must not stall resolves for other captures.
        let built = Arc::new(rebuild_state(snapshot, opts)?);
        let mut cache = self.lock();
        let entry = cache.entry(capture).or_insert_with(|| Arc::clone(&built));
        Ok(Arc::clone(entry))
    }

    pub fn lookup(&self, capture: CaptureId) -> Option<Arc<Rebuild>> {
        self.lock().get(&capture).cloned()
    }

    /// Drop the cached result for `capture`; the next resolve re-runs the
    /// rebuild.
    pub fn invalidate(&self, capture: CaptureId) {
        self.lock().remove(&capture);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CaptureId, Arc<Rebuild>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_resolves_share_one_result() {
        let cache = InitialCommands::new();
        let snapshot = Snapshot::new();
        let opts = RebuildOptions::default();

        let a = cache.resolve(CaptureId(7), &snapshot, &opts).unwrap();
        let b = cache.resolve(CaptureId(7), &snapshot, &opts).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn invalidate_forces_a_rebuild() {
        let cache = InitialCommands::new();
        let snapshot = Snapshot::new();
        let opts = RebuildOptions::default();

        let a = cache.resolve(CaptureId(3), &snapshot, &opts).unwrap();
        cache.invalidate(CaptureId(3));
        let b = cache.resolve(CaptureId(3), &snapshot, &opts).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_captures_resolve_independently() {
        let cache = InitialCommands::new();
        let snapshot = Snapshot::new();
        let opts = RebuildOptions::default();

        let a = cache.resolve(CaptureId(1), &snapshot, &opts).unwrap();
        let b = cache.resolve(CaptureId(2), &snapshot, &opts).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
