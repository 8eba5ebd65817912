use std::sync::Arc;

use merge_events::ProgressChannel;
use merge_runner::JobRunner;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Single-slot merge job runner.
    pub runner: Arc<JobRunner>,
    /// Progress fan-out shared with `runner`.
    pub channel: Arc<ProgressChannel>,
}

impl AppState {
    /// Build the channel and runner described by `config`.
    pub fn new(config: ServerConfig) -> Self {
        let channel = Arc::new(ProgressChannel::with_buffer(config.subscriber_buffer));
        let runner = Arc::new(JobRunner::new(config.runner.clone(), Arc::clone(&channel)));
        Self {
            config: Arc::new(config),
            runner,
            channel,
        }
    }
}
