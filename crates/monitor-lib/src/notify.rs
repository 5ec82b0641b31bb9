//! Batch-ready notification
//!
//! After every cycle the poller publishes one payload-free signal on a
//! well-known channel. Delivery is fire-and-forget: no acknowledgment, no
//! retry, and nobody has to be listening. Consumers re-read the store.

use crate::error::MonitorError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Channel consumers subscribe to for new batches
pub const BATCH_CHANNEL: &str = "dashboard_metrics";

/// Signal body; carries no information beyond "something changed"
pub const BATCH_READY: &str = "uploaded";

/// Named pub/sub channel with fire-and-forget publish
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `message` on `channel`, returning how many subscribers received it
    async fn publish(&self, channel: &str, message: &str) -> Result<usize, MonitorError>;
}

/// Publishes the batch-ready signal once per completed cycle
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn Publisher>,
    channel: String,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self::with_channel(publisher, BATCH_CHANNEL)
    }

    pub fn with_channel(publisher: Arc<dyn Publisher>, channel: impl Into<String>) -> Self {
        Self {
            publisher,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Signal that a batch is ready. Failures are logged and swallowed.
    pub async fn publish(&self) -> bool {
        match self.publisher.publish(&self.channel, BATCH_READY).await {
            Ok(receivers) => {
                debug!(channel = %self.channel, receivers, "Published batch-ready signal");
                true
            }
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Failed to publish batch-ready signal");
                false
            }
        }
    }
}

/// In-process pub/sub hub built on broadcast channels
#[derive(Debug)]
pub struct ChannelHub {
    channels: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ChannelHub {
    /// `capacity` bounds how many unread signals a slow subscriber may lag
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

#[async_trait]
impl Publisher for ChannelHub {
    async fn publish(&self, channel: &str, message: &str) -> Result<usize, MonitorError> {
        let Some(sender) = self.channels.get(channel) else {
            return Ok(0);
        };
        // A send error only means nobody is subscribed right now
        Ok(sender.send(message.to_string()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingPublisher {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for FailingPublisher {
        async fn publish(&self, channel: &str, _message: &str) -> Result<usize, MonitorError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(MonitorError::transport(channel, "connection reset"))
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_signal() {
        let hub = Arc::new(ChannelHub::default());
        let mut rx = hub.subscribe(BATCH_CHANNEL);
        let notifier = Notifier::new(hub.clone());

        assert!(notifier.publish().await);
        assert_eq!(rx.recv().await.unwrap(), BATCH_READY);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let hub = Arc::new(ChannelHub::default());
        let notifier = Notifier::new(hub.clone());
        assert!(notifier.publish().await);

        // Subscriber dropped before publish
        drop(hub.subscribe(BATCH_CHANNEL));
        assert!(notifier.publish().await);
    }

    #[tokio::test]
    async fn test_failed_publish_is_not_retried() {
        let publisher = Arc::new(FailingPublisher {
            attempts: AtomicUsize::new(0),
        });
        let notifier = Notifier::new(publisher.clone());

        assert!(!notifier.publish().await);
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let hub = Arc::new(ChannelHub::default());
        let mut other = hub.subscribe("other");
        Notifier::new(hub.clone()).publish().await;

        assert!(other.try_recv().is_err());
    }
}
