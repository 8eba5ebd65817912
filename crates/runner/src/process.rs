//! Output handling for the merge child process.
//!
//! Each stream is owned by exactly one task: stdout by [`pump_stdout`],
//! stderr by [`collect_stderr`].

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use merge_core::progress_line::{parse_progress_line, ProgressLine};
use merge_core::types::JobId;

/// Maximum stderr retained per job (1 MiB). Older bytes are discarded first
/// so the tail, where errors usually are, survives.
pub(crate) const MAX_STDERR_BYTES: usize = 1024 * 1024;

/// Read stdout line by line and hand every progress marker to `on_progress`.
///
/// Non-matching lines are logged at debug level and otherwise ignored.
/// Returns when the stream closes or a read fails.
pub(crate) async fn pump_stdout<R, F>(job_id: JobId, stdout: Option<R>, mut on_progress: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(ProgressLine),
{
    let Some(stdout) = stdout else {
        return;
    };
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                match parse_progress_line(&line) {
                    Some(progress) => on_progress(progress),
                    None => {
                        tracing::debug!(job_id = %job_id, line = %line.trim_end(), "Merge output");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to read merge stdout");
                break;
            }
        }
    }
}

/// Collect stderr as lossy UTF-8, keeping at most [`MAX_STDERR_BYTES`].
///
/// The stream is read to the end even past the cap so the child never
/// blocks on a full pipe.
pub(crate) async fn collect_stderr<R: AsyncRead + Unpin>(stderr: Option<R>) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                kept.extend_from_slice(&chunk[..n]);
                if kept.len() > MAX_STDERR_BYTES {
                    let excess = kept.len() - MAX_STDERR_BYTES;
                    kept.drain(..excess);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read merge stderr");
                break;
            }
        }
    }

    String::from_utf8_lossy(&kept).into_owned()
}
