//! WebSocket delivery of job progress.
//!
//! Each connection owns one progress subscription for its lifetime.

mod handler;

pub use handler::{ws_handler, HEARTBEAT_INTERVAL};
