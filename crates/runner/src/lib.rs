//! Single-slot runner for the external model-merge program.
//!
//! [`JobRunner`] owns at most one running merge process. It turns the
//! process's `Progress: N%` stdout markers into progress events on a shared
//! [`ProgressChannel`](merge_events::ProgressChannel), collects stderr as
//! diagnostic text, and kills the process once the fixed one-hour deadline
//! passes.

pub mod config;
mod process;
pub mod runner;

pub use config::RunnerConfig;
pub use runner::{JobHandle, JobRunner};
