//! Job lifecycle types shared by the runner and the HTTP layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::job_events::{
    output_confirmation, ProgressEvent, MERGE_SUCCESS_MESSAGE, TIMED_OUT_REASON,
};
use crate::types::{JobId, Timestamp};

/// Fixed wall-clock limit for one merge job, measured from process start.
pub const MAX_JOB_DURATION: Duration = Duration::from_secs(60 * 60);

/// Terminal result of a merge job.
pub type JobOutcome = Result<MergeSummary, JobError>;

/// The terminal progress event that reports `outcome`.
pub fn terminal_event(outcome: &JobOutcome) -> ProgressEvent {
    match outcome {
        Ok(summary) => ProgressEvent::completed(summary.output_path.clone()),
        Err(JobError::TimedOut { .. }) => ProgressEvent::failed(TIMED_OUT_REASON),
        Err(JobError::ProcessFailed { stderr, .. }) => ProgressEvent::failed(stderr.clone()),
        Err(other) => ProgressEvent::failed(other.to_string()),
    }
}

/// Success payload returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub job_id: JobId,
    /// Human-readable completion message.
    pub message: String,
    /// Confirmation that names where the merged model was written.
    pub output: String,
    pub output_path: String,
    pub duration_ms: u64,
}

impl MergeSummary {
    pub fn new(job_id: JobId, output_path: &str, duration: Duration) -> Self {
        Self {
            job_id,
            message: MERGE_SUCCESS_MESSAGE.to_string(),
            output: output_confirmation(output_path),
            output_path: output_path.to_string(),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Whether the single job slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the job slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub state: JobState,
    pub job_id: Option<JobId>,
    pub started_at: Option<Timestamp>,
    pub elapsed_ms: Option<u64>,
    /// Most recent percentage parsed from the running job's output.
    pub last_progress: Option<u8>,
}

impl JobSnapshot {
    pub fn idle() -> Self {
        Self {
            state: JobState::Idle,
            job_id: None,
            started_at: None,
            elapsed_ms: None,
            last_progress: None,
        }
    }
}
