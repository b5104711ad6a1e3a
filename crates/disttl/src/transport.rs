//! Pub/sub capability used to fan invalidation signals out across processes.
//!
//! The cache only needs two operations: publish a string payload on a topic,
//! and subscribe to a topic as a stream of payloads. Dropping the stream ends
//! the subscription.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::error::TransportError;

/// Inbound payloads for one subscription.
pub type SignalStream = BoxStream<'static, String>;

/// Broadcast channel capacity per topic for [`MemoryTransport`].
const DEFAULT_TOPIC_CAPACITY: usize = 100;

/// Publish/subscribe over named topics.
///
/// Delivery is at-most-once and best-effort; implementations are not
/// expected to retry or reconnect. A stream that ends means the
/// subscription is gone for good.
#[async_trait]
pub trait InvalidationTransport: Send + Sync {
    /// Subscribe to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Subscribe`] or [`TransportError::Connection`]
    /// if the subscription cannot be established.
    async fn subscribe(&self, topic: &str) -> Result<SignalStream, TransportError>;

    /// Publish `payload` on `topic` to every current subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Publish`] or [`TransportError::Connection`]
    /// if the message could not be handed to the broker.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError>;
}

/// In-process transport backed by one `tokio::sync::broadcast` channel per topic.
///
/// Caches sharing an `Arc<MemoryTransport>` behave like nodes sharing a
/// broker. Slow subscribers that fall more than the channel capacity behind
/// skip the missed signals.
pub struct MemoryTransport {
    topics: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the topic, ending every stream subscribed to it.
    ///
    /// Mimics a broker connection loss.
    pub fn disconnect(&self, topic: &str) {
        self.topics.remove(topic);
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvalidationTransport for MemoryTransport {
    async fn subscribe(&self, topic: &str) -> Result<SignalStream, TransportError> {
        let receiver = self.sender(topic).subscribe();
        let topic = topic.to_string();

        let stream = BroadcastStream::new(receiver).filter_map(move |item| {
            let topic = topic.clone();
            async move {
                match item {
                    Ok(payload) => Some(payload),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %topic, skipped, "subscriber lagged, signals dropped");
                        None
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        // No receivers is not an error: nobody is listening on this scope yet.
        let receivers = self.sender(topic).send(payload.to_string()).unwrap_or(0);
        tracing::debug!(topic = %topic, receivers, "published signal");
        Ok(())
    }
}
