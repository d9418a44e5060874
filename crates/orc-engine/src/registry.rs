//! The flat stage-worker registry the host supplies to [`crate::Engine`].

use crate::worker::StageWorker;
use orc_types::Stage;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a stage's worker name to the implementation the host registered for
/// it — a flat one-worker-per-stage map, since this system's workers are
/// not pooled.
#[derive(Clone, Default)]
pub struct StageRegistry {
    workers: HashMap<&'static str, Arc<dyn StageWorker>>,
}

impl StageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `worker` under `stage`'s worker name. Panics if `stage` has
    /// no associated worker name (a sentinel state) — that is a programmer
    /// error at registry-construction time, not a runtime condition.
    #[must_use]
    pub fn with_worker(mut self, stage: Stage, worker: Arc<dyn StageWorker>) -> Self {
        let name = stage
            .worker_name()
            .unwrap_or_else(|| panic!("{stage} has no worker slot"));
        self.workers.insert(name, worker);
        self
    }

    /// Look up the worker registered for `stage`, if any.
    #[must_use]
    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageWorker>> {
        let name = stage.worker_name()?;
        self.workers.get(name).cloned()
    }
}
