//! The single configuration record the host constructs and hands to
//! [`crate::Engine::new`].

use orc_policies::PolicyConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything the engine needs besides the stage-worker registry itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub policies: PolicyConfig,
    /// Cap on `Review -> Generate` / `Validate -> Generate` rework loops
    /// before the task is escalated to `Failed`.
    pub max_rework: u32,
    /// Directory `orc-tracer` writes `trace_<task_id>_<unix>.json` files under.
    pub trace_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            policies: PolicyConfig::default(),
            max_rework: 3,
            trace_dir: PathBuf::from("traces"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let config = OrchestratorConfig::default();
        let text = toml::to_string(&config).expect("serialize");
        let parsed: OrchestratorConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(parsed.max_rework, config.max_rework);
        assert_eq!(parsed.trace_dir, config.trace_dir);
    }
}
