//! Domain model for the model-merge job service.
//!
//! Pure types and functions with no I/O: the job request and its validation,
//! progress events and their wire payloads, the stdout progress-marker
//! parser, and the argument builder for the external merge program.

pub mod args;
pub mod error;
pub mod job;
pub mod job_events;
pub mod progress_line;
pub mod request;
pub mod types;
