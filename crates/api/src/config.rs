use std::path::PathBuf;
use std::str::FromStr;

use merge_events::DEFAULT_SUBSCRIBER_BUFFER;
use merge_runner::config::{DEFAULT_PROGRAM, DEFAULT_SCRIPT};
use merge_runner::RunnerConfig;

/// How `POST /api/merge` answers the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionMode {
    /// Hold the request open until the job is terminal, then return its
    /// outcome as JSON.
    #[default]
    Blocking,
    /// Respond immediately with an SSE stream of the job's events.
    Stream,
}

impl SubmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Stream => "stream",
        }
    }
}

impl FromStr for SubmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" => Ok(Self::Blocking),
            "stream" => Ok(Self::Stream),
            other => Err(format!("unknown submission mode '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Timeout for short request/response routes in seconds (default: `30`).
    /// Merge submission and progress streams are exempt.
    pub request_timeout_secs: u64,
    pub submission_mode: SubmissionMode,
    /// How to launch the merge program.
    pub runner: RunnerConfig,
    /// Per-subscriber event buffer before a slow observer is dropped.
    pub subscriber_buffer: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SUBMISSION_MODE`      | `blocking`                 |
    /// | `MERGE_PROGRAM`        | `python3`                  |
    /// | `MERGE_PROGRAM_ARGS`   | `scripts/model_merger.py`  |
    /// | `MERGE_WORKING_DIR`    | (inherit)                  |
    /// | `SUBSCRIBER_BUFFER`    | `64`                       |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from `lookup`.
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let port: u16 = lookup("PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = lookup("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let submission_mode: SubmissionMode = lookup("SUBMISSION_MODE")
            .unwrap_or_else(|| SubmissionMode::default().as_str().into())
            .parse()
            .expect("SUBMISSION_MODE must be 'blocking' or 'stream'");

        let program = lookup("MERGE_PROGRAM").unwrap_or_else(|| DEFAULT_PROGRAM.into());
        let program_args: Vec<String> = lookup("MERGE_PROGRAM_ARGS")
            .unwrap_or_else(|| DEFAULT_SCRIPT.into())
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let mut runner = RunnerConfig::new(program).with_args(program_args);
        if let Some(dir) = lookup("MERGE_WORKING_DIR").filter(|d| !d.trim().is_empty()) {
            runner = runner.with_working_dir(PathBuf::from(dir));
        }

        let subscriber_buffer: usize = lookup("SUBSCRIBER_BUFFER")
            .map(|v| v.parse().expect("SUBSCRIBER_BUFFER must be a valid usize"))
            .unwrap_or(DEFAULT_SUBSCRIBER_BUFFER);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            submission_mode,
            runner,
            subscriber_buffer,
        }
    }
}
