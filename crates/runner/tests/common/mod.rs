//! Shared helpers for runner integration tests.
//!
//! Stub merge programs are shell scripts written to temp files and launched
//! as `sh <script>`, so they receive the request-derived flags as `$@`.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use merge_core::job_events::ProgressEvent;
use merge_core::request::JobRequest;
use merge_events::{ProgressChannel, Subscription};
use merge_runner::{JobRunner, RunnerConfig};

/// Write `body` to a temp shell script. Keep the returned file alive for as
/// long as the job runs.
pub fn write_stub(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".sh")
        .tempfile()
        .expect("create temp file");
    writeln!(f, "#!/bin/sh").expect("write shebang");
    write!(f, "{body}").expect("write body");
    f.flush().expect("flush stub");
    f
}

/// Runner that launches `stub` through `sh`.
pub fn runner_for(stub: &tempfile::NamedTempFile) -> JobRunner {
    let script = stub.path().to_str().expect("utf-8 temp path").to_string();
    JobRunner::new(
        RunnerConfig::new("sh").with_args([script]),
        Arc::new(ProgressChannel::default()),
    )
}

/// A valid request writing to `/out`.
pub fn sample_request() -> JobRequest {
    JobRequest {
        base_model: "/models/base".into(),
        target_model: "/models/instruct".into(),
        finetune_outputs: vec!["/ft/a".into(), "/ft/b".into()],
        output_path: "/out".into(),
        weights: None,
        densities: None,
    }
}

/// Take every event already buffered for `sub`.
pub fn drain(sub: &mut Subscription) -> Vec<ProgressEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

pub fn progress(percent: u8) -> ProgressEvent {
    ProgressEvent::Progress {
        percent,
        message: None,
    }
}
