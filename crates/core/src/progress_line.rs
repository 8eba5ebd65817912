//! Parser for the progress marker the merge program writes to stdout.
//!
//! A progress line contains `Progress: <N>%` where `N` is an integer in
//! `0..=100`, optionally followed by a free-form status message:
//!
//! ```text
//! Progress: 30%
//! Progress: 80% Saving merged model
//! [merge] progress: 55% - loading shards
//! ```
//!
//! Everything else on stdout is ordinary log output and is ignored for
//! progress purposes.

use std::sync::LazyLock;

use regex::Regex;

/// Case-insensitive marker, integer percentage, optional trailing status.
const PROGRESS_PATTERN: &str = r"(?i)\bprogress:\s*(\d{1,3})\s*%\s*(?:[-:|]\s*)?(.*)$";

static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PROGRESS_PATTERN).expect("valid regex"));

/// Highest percentage the marker may carry.
pub const MAX_PERCENT: u8 = 100;

/// A progress marker extracted from one stdout line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    pub percent: u8,
    pub message: Option<String>,
}

/// Parse one stdout line. Returns `None` for non-progress lines and for
/// percentages above [`MAX_PERCENT`].
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let caps = PROGRESS_RE.captures(line.trim_end())?;
    let percent: u8 = caps.get(1)?.as_str().parse().ok()?;
    if percent > MAX_PERCENT {
        return None;
    }

    let message = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    Some(ProgressLine { percent, message })
}
