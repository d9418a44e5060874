use crate::error::TracerError;
use chrono::Utc;
use orc_types::TaskId;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single event within an [`ExecutionTrace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp: String,
    pub event_type: String,
    pub agent: Option<String>,
    pub data: serde_json::Value,
    pub duration_ms: Option<f64>,
}

impl TraceEvent {
    fn now(event_type: impl Into<String>, agent: Option<String>, data: serde_json::Value, duration_ms: Option<f64>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.into(),
            agent,
            data,
            duration_ms,
        }
    }
}

/// The complete, append-only record of one task's execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub task_id: TaskId,
    pub started_at: String,
    pub events: Vec<TraceEvent>,
    pub completed_at: Option<String>,
    pub status: String,
    pub total_tokens: u64,
}

impl ExecutionTrace {
    fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            started_at: Utc::now().to_rfc3339(),
            events: Vec::new(),
            completed_at: None,
            status: "running".to_string(),
            total_tokens: 0,
        }
    }

    pub fn add_event(
        &mut self,
        event_type: impl Into<String>,
        data: serde_json::Value,
        agent: Option<String>,
        duration_ms: Option<f64>,
    ) {
        self.events.push(TraceEvent::now(event_type, agent, data, duration_ms));
    }

    pub fn complete(&mut self, status: impl Into<String>, total_tokens: u64) {
        self.completed_at = Some(Utc::now().to_rfc3339());
        self.status = status.into();
        self.total_tokens = total_tokens;
    }

    /// Write the trace to `output_dir` as `trace_<task_id>_<unix-seconds>.json`.
    /// The write lands via a temp file + rename so a reader never observes a
    /// partially-written trace.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf, TracerError> {
        std::fs::create_dir_all(output_dir).map_err(|source| TracerError::CreateDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let filename = format!("trace_{}_{}.json", self.task_id, Utc::now().timestamp());
        let final_path = output_dir.join(filename);
        let tmp_path = final_path.with_extension("json.tmp");

        let body = serde_json::to_vec_pretty(self)?;
        {
            let mut file = std::fs::File::create(&tmp_path).map_err(|source| TracerError::Write {
                path: tmp_path.clone(),
                source,
            })?;
            file.write_all(&body).map_err(|source| TracerError::Write {
                path: tmp_path.clone(),
                source,
            })?;
            file.sync_all().map_err(|source| TracerError::Write {
                path: tmp_path.clone(),
                source,
            })?;
        }
        std::fs::rename(&tmp_path, &final_path).map_err(|source| TracerError::Write {
            path: final_path.clone(),
            source,
        })?;
        Ok(final_path)
    }
}

/// Owns at most one in-flight trace at a time.
#[derive(Debug)]
pub struct ExecutionTracer {
    output_dir: PathBuf,
    current: Option<ExecutionTrace>,
}

impl ExecutionTracer {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            current: None,
        }
    }

    pub fn start_trace(&mut self, task_id: TaskId) -> &mut ExecutionTrace {
        tracing::debug!(%task_id, "starting execution trace");
        self.current = Some(ExecutionTrace::new(task_id));
        self.current.as_mut().expect("just inserted")
    }

    pub fn add_event(
        &mut self,
        event_type: impl Into<String>,
        data: serde_json::Value,
        agent: Option<String>,
        duration_ms: Option<f64>,
    ) {
        if let Some(trace) = self.current.as_mut() {
            trace.add_event(event_type, data, agent, duration_ms);
        }
    }

    /// Complete and persist the current trace, clearing the slot.
    pub fn complete_trace(
        &mut self,
        status: impl Into<String>,
        total_tokens: u64,
    ) -> Result<Option<PathBuf>, TracerError> {
        let Some(mut trace) = self.current.take() else {
            return Ok(None);
        };
        trace.complete(status, total_tokens);
        let path = trace.save(&self.output_dir)?;
        tracing::info!(path = %path.display(), "execution trace saved");
        Ok(Some(path))
    }

    #[must_use]
    pub fn current(&self) -> Option<&ExecutionTrace> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trace_round_trips_through_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut tracer = ExecutionTracer::new(dir.path());
        let task_id = TaskId::new();
        tracer.start_trace(task_id);
        tracer.add_event("stage_started", json!({"stage": "analyze"}), Some("issue_intelligence".to_string()), None);
        tracer.add_event("stage_completed", json!({"stage": "analyze"}), None, Some(120.5));

        let path = tracer.complete_trace("success", 42).expect("complete").expect("some path");
        assert!(tracer.current().is_none());

        let contents = std::fs::read_to_string(&path).expect("read");
        let loaded: ExecutionTrace = serde_json::from_str(&contents).expect("parse");
        assert_eq!(loaded.task_id, task_id);
        assert_eq!(loaded.events.len(), 2);
        assert_eq!(loaded.status, "success");
        assert_eq!(loaded.total_tokens, 42);
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn complete_without_start_is_a_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut tracer = ExecutionTracer::new(dir.path());
        assert!(tracer.complete_trace("success", 0).expect("complete").is_none());
    }

    #[test]
    fn events_before_start_are_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut tracer = ExecutionTracer::new(dir.path());
        tracer.add_event("ignored", json!({}), None, None);
        assert!(tracer.current().is_none());
    }
}
