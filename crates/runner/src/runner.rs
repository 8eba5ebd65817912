//! Merge job lifecycle: `Idle -> Starting -> Running -> {Completed, Failed,
//! TimedOut} -> Idle`.
//!
//! [`JobRunner::start`] validates the request, claims the single job slot,
//! and spawns the merge program. Four tasks then cooperate per job:
//!
//! 1. the stdout pump, publishing `Progress` events;
//! 2. the stderr collector;
//! 3. the deadline watchdog, tripping the job's cancellation token after
//!    [`MAX_JOB_DURATION`];
//! 4. the driver, racing process exit against the token and resolving the
//!    terminal outcome.
//!
//! The slot is cleared and the terminal event published under the slot lock,
//! so a job started right after a terminal event can never publish ahead of
//! it.

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use merge_core::args::build_merge_args;
use merge_core::error::JobError;
use merge_core::job::{
    terminal_event, JobOutcome, JobSnapshot, JobState, MergeSummary, MAX_JOB_DURATION,
};
use merge_core::job_events::{ProgressEvent, PROCESS_FAILED_REASON};
use merge_core::request::JobRequest;
use merge_core::types::{JobId, Timestamp};
use merge_events::{ProgressChannel, Subscription};

use crate::config::RunnerConfig;
use crate::process::{collect_stderr, pump_stdout};

/// How long to wait for the output streams to close after the process
/// exits. A grandchild that inherited the pipes can keep them open
/// indefinitely; past this grace period the readers are abandoned.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Job slot
// ---------------------------------------------------------------------------

/// State of the job currently holding the slot.
struct ActiveJob {
    id: JobId,
    started_at: Timestamp,
    started: Instant,
    last_progress: Option<u8>,
}

/// The single job slot. `None` means idle.
#[derive(Default)]
struct JobSlot {
    active: Mutex<Option<ActiveJob>>,
}

impl JobSlot {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveJob>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_progress(&self, id: JobId, percent: u8) {
        if let Some(job) = self.lock().as_mut().filter(|job| job.id == id) {
            job.last_progress = Some(percent);
        }
    }

    /// Clear the slot for `id` and publish its terminal event while still
    /// holding the lock. Returns `false` if the slot no longer belongs to
    /// `id`.
    fn release(&self, id: JobId, channel: &ProgressChannel, terminal: ProgressEvent) -> bool {
        let mut active = self.lock();
        if active.as_ref().map(|job| job.id) != Some(id) {
            return false;
        }
        *active = None;
        channel.publish(terminal);
        true
    }
}

/// Releases the slot if the driver unwinds before reaching a terminal state.
struct SlotRelease {
    id: JobId,
    slot: Arc<JobSlot>,
    channel: Arc<ProgressChannel>,
    released: bool,
}

impl SlotRelease {
    fn finish(mut self, terminal: ProgressEvent) {
        self.released = true;
        self.slot.release(self.id, &self.channel, terminal);
    }
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        if !self.released
            && self.slot.release(
                self.id,
                &self.channel,
                ProgressEvent::failed("merge job aborted"),
            )
        {
            tracing::error!(job_id = %self.id, "Merge job driver stopped before a terminal state");
        }
    }
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Caller-facing handle to the running job.
///
/// Dropping the handle does not stop the job; it only discards the outcome.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    started_at: Timestamp,
    pid: Option<u32>,
    cancel: CancellationToken,
    outcome: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// OS process id of the merge program, if still known at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the deadline has tripped this job's cancellation flag.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> JobOutcome {
        self.outcome.await.unwrap_or_else(|_| {
            Err(JobError::ProcessFailed {
                exit_code: None,
                stderr: "merge job driver stopped unexpectedly".to_string(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

/// Owns the single merge job slot and publishes its progress.
///
/// Shared as `Arc<JobRunner>` across request handlers.
pub struct JobRunner {
    config: RunnerConfig,
    channel: Arc<ProgressChannel>,
    slot: Arc<JobSlot>,
}

impl JobRunner {
    pub fn new(config: RunnerConfig, channel: Arc<ProgressChannel>) -> Self {
        Self {
            config,
            channel,
            slot: Arc::new(JobSlot::default()),
        }
    }

    pub fn channel(&self) -> &Arc<ProgressChannel> {
        &self.channel
    }

    pub fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Current slot state.
    pub fn snapshot(&self) -> JobSnapshot {
        match self.slot.lock().as_ref() {
            None => JobSnapshot::idle(),
            Some(job) => JobSnapshot {
                state: JobState::Running,
                job_id: Some(job.id),
                started_at: Some(job.started_at),
                elapsed_ms: Some(job.started.elapsed().as_millis() as u64),
                last_progress: job.last_progress,
            },
        }
    }

    /// Validate `request`, claim the slot, and launch the merge program.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`JobError::InvalidRequest`] if the request is malformed.
    /// - [`JobError::AlreadyRunning`] if a job holds the slot.
    /// - [`JobError::LaunchFailed`] if the program cannot be spawned. No
    ///   event is published and the slot stays idle.
    pub fn start(&self, request: JobRequest) -> Result<JobHandle, JobError> {
        self.launch(request, || ()).map(|(handle, ())| handle)
    }

    /// Like [`start`](Self::start), but also returns a subscription that
    /// sees exactly this job's events, from its first progress event through
    /// its terminal event.
    ///
    /// The subscription is registered while the slot lock is held, so no
    /// earlier job's terminal event can reach it.
    pub fn start_observed(&self, request: JobRequest) -> Result<(JobHandle, Subscription), JobError> {
        self.launch(request, || self.channel.subscribe())
    }

    /// Shared body of the `start` variants. `on_claim` runs once the slot is
    /// claimed, before the output pumps exist, with the slot lock held.
    fn launch<T>(
        &self,
        request: JobRequest,
        on_claim: impl FnOnce() -> T,
    ) -> Result<(JobHandle, T), JobError> {
        request.validate()?;

        let mut active = self.slot.lock();
        if active.is_some() {
            return Err(JobError::AlreadyRunning);
        }

        let args = build_merge_args(&request);
        let mut cmd = self.config.command();
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            tracing::error!(program = %self.config.program, error = %e, "Failed to launch merge process");
            JobError::LaunchFailed(format!("{}: {e}", self.config.program))
        })?;

        let id = JobId::new_v4();
        let started_at = chrono::Utc::now();
        let started = Instant::now();
        let pid = child.id();
        *active = Some(ActiveJob {
            id,
            started_at,
            started,
            last_progress: None,
        });
        let claimed = on_claim();
        drop(active);

        tracing::info!(
            job_id = %id,
            pid = ?pid,
            program = %self.config.program,
            output_path = %request.output_path,
            finetunes = request.finetune_outputs.len(),
            "Merge job started",
        );

        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let watchdog = tokio::spawn(watch_deadline(cancel.clone(), MAX_JOB_DURATION));

        let driver = JobDriver {
            id,
            output_path: request.output_path,
            started,
            channel: Arc::clone(&self.channel),
            slot: Arc::clone(&self.slot),
            cancel: cancel.clone(),
        };
        tokio::spawn(
            driver
                .run(child, watchdog, outcome_tx)
                .instrument(tracing::info_span!("merge_job", job_id = %id)),
        );

        let handle = JobHandle {
            id,
            started_at,
            pid,
            cancel,
            outcome: outcome_rx,
        };
        Ok((handle, claimed))
    }
}

/// Trip `cancel` once `deadline` has elapsed.
async fn watch_deadline(cancel: CancellationToken, deadline: Duration) {
    tokio::time::sleep(deadline).await;
    cancel.cancel();
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct JobDriver {
    id: JobId,
    output_path: String,
    started: Instant,
    channel: Arc<ProgressChannel>,
    slot: Arc<JobSlot>,
    cancel: CancellationToken,
}

impl JobDriver {
    async fn run(
        self,
        mut child: Child,
        watchdog: JoinHandle<()>,
        outcome_tx: oneshot::Sender<JobOutcome>,
    ) {
        let release = SlotRelease {
            id: self.id,
            slot: Arc::clone(&self.slot),
            channel: Arc::clone(&self.channel),
            released: false,
        };

        let mut stdout_task = {
            let (id, channel, slot) = (self.id, Arc::clone(&self.channel), Arc::clone(&self.slot));
            let stdout = child.stdout.take();
            tokio::spawn(async move {
                pump_stdout(id, stdout, |progress| {
                    slot.record_progress(id, progress.percent);
                    channel.publish(ProgressEvent::Progress {
                        percent: progress.percent,
                        message: progress.message,
                    });
                })
                .await;
            })
        };
        let mut stderr_task = tokio::spawn(collect_stderr(child.stderr.take()));

        let exit = tokio::select! {
            status = child.wait() => Some(status),
            () = self.cancel.cancelled() => None,
        };
        watchdog.abort();

        let outcome: JobOutcome = match exit {
            None => {
                // Deadline passed. `kill` is a no-op error if the process
                // exited in the meantime.
                if let Err(e) = child.kill().await {
                    tracing::debug!(error = %e, "Kill after deadline reported an error");
                }
                stdout_task.abort();
                stderr_task.abort();
                let _ = stdout_task.await;
                let _ = stderr_task.await;

                let elapsed_ms = self.started.elapsed().as_millis() as u64;
                tracing::error!(elapsed_ms, "Merge job timed out, process killed");
                Err(JobError::TimedOut { elapsed_ms })
            }
            Some(Ok(status)) => {
                if tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut stdout_task)
                    .await
                    .is_err()
                {
                    tracing::warn!("Merge stdout still open after exit, abandoning reader");
                    stdout_task.abort();
                    let _ = stdout_task.await;
                }
                let stderr = match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut stderr_task).await {
                    Ok(Ok(text)) => text,
                    Ok(Err(_)) => String::new(),
                    Err(_) => {
                        stderr_task.abort();
                        String::new()
                    }
                };

                let elapsed = self.started.elapsed();
                if status.success() {
                    tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "Merge job completed");
                    Ok(MergeSummary::new(self.id, &self.output_path, elapsed))
                } else {
                    let exit_code = status.code();
                    let trimmed = stderr.trim();
                    let reason = if trimmed.is_empty() {
                        PROCESS_FAILED_REASON.to_string()
                    } else {
                        trimmed.to_string()
                    };
                    tracing::warn!(exit_code = ?exit_code, stderr = %trimmed, "Merge job failed");
                    Err(JobError::ProcessFailed {
                        exit_code,
                        stderr: reason,
                    })
                }
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Failed to wait for merge process");
                stdout_task.abort();
                stderr_task.abort();
                let _ = stdout_task.await;
                Err(JobError::ProcessFailed {
                    exit_code: None,
                    stderr: format!("failed to wait for merge process: {e}"),
                })
            }
        };

        release.finish(terminal_event(&outcome));
        let _ = outcome_tx.send(outcome);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
