//! In-process progress channel for the merge job service.
//!
//! - [`ProgressChannel`]: publish/subscribe hub for
//!   [`ProgressEvent`](merge_core::job_events::ProgressEvent)s with a bounded
//!   buffer per subscriber and drop-on-failure delivery.
//! - [`Subscription`]: one observer's receiving end; dropping it
//!   unsubscribes.

pub mod channel;

pub use channel::{ProgressChannel, SubscriberId, Subscription, DEFAULT_SUBSCRIBER_BUFFER};
