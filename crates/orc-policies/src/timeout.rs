//! Named timeout categories.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The operation categories a timeout can be looked up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutCategory {
    StageWorker,
    RemoteApi,
    TestRunner,
    WholeTask,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    pub stage_worker_seconds: u64,
    pub remote_api_seconds: u64,
    pub test_runner_seconds: u64,
    pub whole_task_seconds: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            stage_worker_seconds: 300,
            remote_api_seconds: 30,
            test_runner_seconds: 600,
            whole_task_seconds: 3600,
        }
    }
}

impl TimeoutPolicy {
    /// The configured duration for `category`. Unknown categories are not
    /// representable since the enum is closed, so this never falls back.
    #[must_use]
    pub fn duration(&self, category: TimeoutCategory) -> Duration {
        let secs = match category {
            TimeoutCategory::StageWorker => self.stage_worker_seconds,
            TimeoutCategory::RemoteApi => self.remote_api_seconds,
            TimeoutCategory::TestRunner => self.test_runner_seconds,
            TimeoutCategory::WholeTask => self.whole_task_seconds,
        };
        Duration::from_secs(secs)
    }
}
