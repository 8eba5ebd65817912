//! Fan-out channel for job progress events.
//!
//! [`ProgressChannel`] owns the registry of live subscribers. Each subscriber
//! gets its own bounded `mpsc` buffer. Publishing is fire-and-forget: a
//! subscriber whose buffer is full or whose receiver is gone is removed on
//! the spot, so one slow consumer never delays the others and the publisher
//! never waits.
//!
//! Events published before a subscriber joins are never delivered to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::Stream;
use merge_core::job_events::ProgressEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifier assigned to a subscriber at registration.
pub type SubscriberId = u64;

/// Default number of undelivered events a subscriber may hold before it is
/// considered unresponsive and dropped.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

type Registry = Mutex<HashMap<SubscriberId, mpsc::Sender<ProgressEvent>>>;

/// Lock the registry. Every critical section is a single map operation, so a
/// poisoned lock still guards a consistent map.
fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<ProgressEvent>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// ProgressChannel
// ---------------------------------------------------------------------------

/// Publish/subscribe hub for progress events.
///
/// Designed to be shared as `Arc<ProgressChannel>` between the job runner
/// (the single publisher) and every connection handler (subscribers).
///
/// # Usage
///
/// ```rust
/// use merge_core::job_events::ProgressEvent;
/// use merge_events::ProgressChannel;
///
/// let channel = ProgressChannel::default();
/// let mut sub = channel.subscribe();
///
/// channel.publish(ProgressEvent::completed("/out"));
/// assert!(sub.try_recv().is_some());
/// ```
pub struct ProgressChannel {
    subscribers: Arc<Registry>,
    next_id: AtomicU64,
    buffer: usize,
}

impl ProgressChannel {
    /// Create a channel whose subscribers each buffer up to `buffer` events.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber. It receives every event published after
    /// this call returns.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        lock(&self.subscribers).insert(id, tx);
        tracing::debug!(subscriber_id = id, "Progress subscriber registered");

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if lock(&self.subscribers).remove(&id).is_some() {
            tracing::debug!(subscriber_id = id, "Progress subscriber removed");
        }
    }

    /// Deliver `event` to every registered subscriber without blocking.
    ///
    /// Subscribers that cannot take the event right now (buffer full) or
    /// that have gone away are dropped from the registry. Returns the number
    /// of subscribers the event was delivered to.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let mut subscribers = lock(&self.subscribers);
        let mut delivered = 0;

        subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(subscriber_id = *id, "Subscriber buffer full, dropping subscriber");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber_id = *id, "Subscriber disconnected, pruning");
                false
            }
        });

        delivered
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Drop every subscriber. Open subscriptions drain what they already
    /// buffered and then end.
    ///
    /// Used during graceful shutdown.
    pub fn close_all(&self) {
        let mut subscribers = lock(&self.subscribers);
        let count = subscribers.len();
        subscribers.clear();
        tracing::info!(count, "Closed all progress subscribers");
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Receiving end for one observer.
///
/// Dropping the subscription removes it from the channel's registry.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<ProgressEvent>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscriber has been removed from the channel
    /// (unresponsive, shut down) and its buffer is drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Turn this subscription into a stream that ends right after the first
    /// terminal event (`Completed` or `Failed`), unsubscribing at that point.
    pub fn into_job_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        futures::stream::unfold(Some(self), |state| async move {
            let mut sub = state?;
            let event = sub.recv().await?;
            let next = if event.is_terminal() { None } else { Some(sub) };
            Some((event, next))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn progress(percent: u8) -> ProgressEvent {
        ProgressEvent::Progress {
            percent,
            message: None,
        }
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let channel = ProgressChannel::default();
        let mut sub = channel.subscribe();

        assert_eq!(channel.publish(progress(10)), 1);

        let received = sub.recv().await.expect("should receive the event");
        assert_eq!(received, progress(10));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let channel = ProgressChannel::default();
        let mut sub1 = channel.subscribe();
        let mut sub2 = channel.subscribe();

        assert_eq!(channel.publish(progress(42)), 2);

        assert_eq!(sub1.recv().await, Some(progress(42)));
        assert_eq!(sub2.recv().await, Some(progress(42)));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let channel = ProgressChannel::default();
        assert_eq!(channel.publish(progress(1)), 0);
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let channel = ProgressChannel::default();
        let a = channel.subscribe();
        let b = channel.subscribe();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let channel = ProgressChannel::default();
        let sub = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 1);

        drop(sub);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn explicit_unsubscribe_ends_subscription() {
        let channel = ProgressChannel::default();
        let mut sub = channel.subscribe();

        channel.unsubscribe(sub.id());
        channel.publish(progress(5));

        assert_eq!(channel.subscriber_count(), 0);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn unsubscribe_unknown_id_is_noop() {
        let channel = ProgressChannel::default();
        let _sub = channel.subscribe();

        channel.unsubscribe(9999);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn full_buffer_drops_subscriber() {
        let channel = ProgressChannel::with_buffer(2);
        let mut sub = channel.subscribe();

        assert_eq!(channel.publish(progress(1)), 1);
        assert_eq!(channel.publish(progress(2)), 1);
        // Third event does not fit: the subscriber is dropped.
        assert_eq!(channel.publish(progress(3)), 0);
        assert_eq!(channel.subscriber_count(), 0);

        // Already buffered events are still readable, then the stream ends.
        assert_eq!(sub.try_recv(), Some(progress(1)));
        assert_eq!(sub.try_recv(), Some(progress(2)));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn close_all_ends_every_subscription() {
        let channel = ProgressChannel::default();
        let mut sub1 = channel.subscribe();
        let mut sub2 = channel.subscribe();

        channel.close_all();

        assert_eq!(channel.subscriber_count(), 0);
        assert!(sub1.recv().await.is_none());
        assert!(sub2.recv().await.is_none());
    }

    #[tokio::test]
    async fn job_stream_stops_after_terminal_event() {
        let channel = ProgressChannel::default();
        let sub = channel.subscribe();

        channel.publish(progress(50));
        channel.publish(ProgressEvent::completed("/out"));
        channel.publish(progress(1));

        let events: Vec<_> = sub.into_job_stream().collect().await;
        assert_eq!(events, vec![progress(50), ProgressEvent::completed("/out")]);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn subscription_outliving_channel_drops_cleanly() {
        let channel = ProgressChannel::default();
        let sub = channel.subscribe();
        drop(channel);
        drop(sub);
    }
}
