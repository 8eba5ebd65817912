/// Errors surfaced by the merge job lifecycle.
///
/// `InvalidRequest` and `AlreadyRunning` are rejected synchronously at
/// submission time and never reach the progress channel. The remaining
/// variants are runtime failures: each is published as a `Failed` event and
/// also returned to the original submitter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("A merge job is already running")]
    AlreadyRunning,

    #[error("Failed to launch merge process: {0}")]
    LaunchFailed(String),

    #[error("Merge process failed (exit code {exit_code:?}): {stderr}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Operation timed out after {elapsed_ms}ms")]
    TimedOut { elapsed_ms: u64 },
}

impl JobError {
    /// Stable machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "VALIDATION_ERROR",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::LaunchFailed(_) => "LAUNCH_FAILED",
            Self::ProcessFailed { .. } => "PROCESS_FAILED",
            Self::TimedOut { .. } => "TIMED_OUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_process_failed_includes_stderr() {
        let err = JobError::ProcessFailed {
            exit_code: Some(2),
            stderr: "bad shape".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Merge process failed (exit code Some(2)): bad shape"
        );
    }

    #[test]
    fn display_timed_out() {
        let err = JobError::TimedOut { elapsed_ms: 3_600_000 };
        assert_eq!(err.to_string(), "Operation timed out after 3600000ms");
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            JobError::InvalidRequest(String::new()),
            JobError::AlreadyRunning,
            JobError::LaunchFailed(String::new()),
            JobError::ProcessFailed {
                exit_code: None,
                stderr: String::new(),
            },
            JobError::TimedOut { elapsed_ms: 0 },
        ];
        let mut codes: Vec<_> = errors.iter().map(JobError::code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
