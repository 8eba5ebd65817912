//! Progress events published while a merge job runs, and the JSON payloads
//! delivered to observers.
//!
//! Observers receive one of three payload shapes:
//!
//! ```text
//! { "progress": 55 }                              progress, no status
//! { "progress": 55, "status": "Saving" }          progress with status
//! { "error": "bad shape" }                        failure
//! ```
//!
//! The completion payload is a progress payload at 100 that also carries a
//! human-readable `message` and an `output` confirmation.

use serde::{Deserialize, Serialize};

/// SSE event name for [`ProgressEvent::Progress`].
pub const EVENT_NAME_PROGRESS: &str = "progress";

/// SSE event name for [`ProgressEvent::Completed`].
pub const EVENT_NAME_COMPLETED: &str = "completed";

/// SSE event name for [`ProgressEvent::Failed`].
pub const EVENT_NAME_FAILED: &str = "failed";

/// Status text attached to the completion payload.
pub const STATUS_COMPLETE: &str = "Complete";

/// Summary attached to a successful merge.
pub const MERGE_SUCCESS_MESSAGE: &str = "Models merged successfully";

/// Failure reason published when the deadline kills the process.
pub const TIMED_OUT_REASON: &str = "timed out";

/// Fallback failure reason when the process exits non-zero without stderr.
pub const PROCESS_FAILED_REASON: &str = "Process failed";

/// A discrete update describing the state of the running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        percent: u8,
        message: Option<String>,
    },
    Completed {
        summary: String,
        output_path: String,
    },
    Failed {
        reason: String,
    },
}

impl ProgressEvent {
    /// Build the completion event for a merge written to `output_path`.
    pub fn completed(output_path: impl Into<String>) -> Self {
        Self::Completed {
            summary: MERGE_SUCCESS_MESSAGE.to_string(),
            output_path: output_path.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// `Completed` and `Failed` end a job; nothing for that job follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => EVENT_NAME_PROGRESS,
            Self::Completed { .. } => EVENT_NAME_COMPLETED,
            Self::Failed { .. } => EVENT_NAME_FAILED,
        }
    }

    /// Convert to the observer-facing wire payload.
    pub fn to_payload(&self) -> ProgressPayload {
        match self {
            Self::Progress { percent, message } => ProgressPayload {
                progress: Some(*percent),
                status: message.clone(),
                ..Default::default()
            },
            Self::Completed {
                summary,
                output_path,
            } => ProgressPayload {
                progress: Some(100),
                status: Some(STATUS_COMPLETE.to_string()),
                message: Some(summary.clone()),
                output: Some(output_confirmation(output_path)),
                ..Default::default()
            },
            Self::Failed { reason } => ProgressPayload {
                error: Some(reason.clone()),
                ..Default::default()
            },
        }
    }
}

/// Human-readable confirmation of where the merged model was written.
pub fn output_confirmation(output_path: &str) -> String {
    format!("Merged model saved to {output_path}")
}

/// JSON payload pushed to progress observers. Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn progress_without_status_serializes_bare() {
        let event = ProgressEvent::Progress {
            percent: 55,
            message: None,
        };
        let value = serde_json::to_value(event.to_payload()).expect("serialize");
        assert_eq!(value, json!({ "progress": 55 }));
    }

    #[test]
    fn progress_with_status() {
        let event = ProgressEvent::Progress {
            percent: 80,
            message: Some("Saving merged model".to_string()),
        };
        let value = serde_json::to_value(event.to_payload()).expect("serialize");
        assert_eq!(value, json!({ "progress": 80, "status": "Saving merged model" }));
    }

    #[test]
    fn completed_carries_message_and_output() {
        let value = serde_json::to_value(ProgressEvent::completed("/out").to_payload())
            .expect("serialize");
        assert_eq!(
            value,
            json!({
                "progress": 100,
                "status": "Complete",
                "message": "Models merged successfully",
                "output": "Merged model saved to /out",
            })
        );
    }

    #[test]
    fn failed_is_error_only() {
        let value = serde_json::to_value(ProgressEvent::failed("bad shape").to_payload())
            .expect("serialize");
        assert_eq!(value, json!({ "error": "bad shape" }));
    }

    #[test]
    fn terminal_classification() {
        assert!(!ProgressEvent::Progress {
            percent: 1,
            message: None
        }
        .is_terminal());
        assert!(ProgressEvent::completed("/out").is_terminal());
        assert!(ProgressEvent::failed(TIMED_OUT_REASON).is_terminal());
    }

    #[test]
    fn event_names() {
        assert_eq!(ProgressEvent::completed("/o").event_name(), "completed");
        assert_eq!(ProgressEvent::failed("x").event_name(), "failed");
    }
}
