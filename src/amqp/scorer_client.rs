//! Scorer client: publishes requests and correlates replies
//!
//! The client owns a pending-request table guarded by its own lock. The
//! reply consumer runs independently of any queue lock and only touches
//! this table; entries are evicted on both resolution and abandonment so
//! sustained timeouts cannot grow the table without bound.

use crate::amqp::messages::{ScorerReply, ScorerRequest, SCORER_REPLY_QUEUE, SCORER_REQUEST_QUEUE};
use crate::error::{MatchmakingError, Result};
use amqprs::{
    channel::{
        BasicCancelArguments, BasicConsumeArguments, BasicPublishArguments, Channel,
        QueueDeclareArguments,
    },
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use uuid::Uuid;
use tracing::{info, warn};

/// Trait for the scorer request/reply transport
#[async_trait]
pub trait ScorerClient: Send + Sync {
    /// Register interest in a correlation id before publishing. The
    /// returned receiver resolves when the reply listener sees that id.
    fn register(&self, request_id: Uuid) -> oneshot::Receiver<ScorerReply>;

    /// Drop a pending entry so a late reply for it is discarded rather
    /// than delivered to a stale waiter.
    fn abandon(&self, request_id: &Uuid);

    /// Publish a request to the scorer service and flush it.
    async fn publish(&self, request: &ScorerRequest) -> Result<()>;

    /// Stop the reply listener and release the transport.
    async fn shutdown(&self) -> Result<()>;
}

/// Pending-request table shared between publishers and the reply listener
#[derive(Clone, Default)]
pub(crate) struct PendingRequests {
    inner: Arc<Mutex<HashMap<Uuid, oneshot::Sender<ScorerReply>>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, request_id: Uuid) -> oneshot::Receiver<ScorerReply> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.inner.lock() {
            pending.insert(request_id, tx);
        }
        rx
    }

    pub fn abandon(&self, request_id: &Uuid) {
        if let Ok(mut pending) = self.inner.lock() {
            pending.remove(request_id);
        }
    }

    /// Resolve a reply against its pending entry. Returns false when no
    /// waiter is registered (late or unknown correlation id).
    pub fn resolve(&self, reply: ScorerReply) -> bool {
        let sender = match self.inner.lock() {
            Ok(mut pending) => pending.remove(&reply.request_id),
            Err(_) => None,
        };

        match sender {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|p| p.len()).unwrap_or(0)
    }
}

/// AMQP-backed scorer client
pub struct AmqpScorerClient {
    channel: Channel,
    pending: PendingRequests,
    consumer_tag: String,
}

impl AmqpScorerClient {
    /// Declare the request/reply queues and start the reply consumer
    pub async fn new(channel: Channel) -> Result<Self> {
        for queue in [SCORER_REQUEST_QUEUE, SCORER_REPLY_QUEUE] {
            channel
                .queue_declare(QueueDeclareArguments::durable_client_named(queue))
                .await
                .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                    message: format!("Failed to declare queue {}: {}", queue, e),
                })?;
        }

        let pending = PendingRequests::new();
        let consumer_tag = format!("scorer-replies-{}", Uuid::new_v4());

        let args = BasicConsumeArguments::new(SCORER_REPLY_QUEUE, &consumer_tag)
            .auto_ack(true)
            .finish();
        channel
            .basic_consume(ReplyConsumer::new(pending.clone()), args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to start reply consumer: {}", e),
            })?;

        info!("Scorer reply consumer started on {}", SCORER_REPLY_QUEUE);

        Ok(Self {
            channel,
            pending,
            consumer_tag,
        })
    }
}

#[async_trait]
impl ScorerClient for AmqpScorerClient {
    fn register(&self, request_id: Uuid) -> oneshot::Receiver<ScorerReply> {
        self.pending.register(request_id)
    }

    fn abandon(&self, request_id: &Uuid) {
        self.pending.abandon(request_id);
    }

    async fn publish(&self, request: &ScorerRequest) -> Result<()> {
        let payload = request.to_bytes()?;

        let args = BasicPublishArguments::new("", SCORER_REQUEST_QUEUE);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&request.request_id.to_string())
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| {
                MatchmakingError::ScorerFailure {
                    reason: format!("Failed to publish scorer request: {}", e),
                }
                .into()
            })
    }

    async fn shutdown(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);
        self.channel.basic_cancel(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to stop reply consumer: {}", e),
            }
        })?;

        info!("Scorer reply consumer stopped");
        Ok(())
    }
}

/// Consumer that drains the reply queue and resolves pending entries
struct ReplyConsumer {
    pending: PendingRequests,
}

impl ReplyConsumer {
    fn new(pending: PendingRequests) -> Self {
        Self { pending }
    }
}

#[async_trait]
impl AsyncConsumer for ReplyConsumer {
    async fn consume(
        &mut self,
        _channel: &Channel,
        _deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let reply = match ScorerReply::from_bytes(&content) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Discarding malformed scorer reply: {}", e);
                return;
            }
        };

        let request_id = reply.request_id;
        if !self.pending.resolve(reply) {
            // The requester already gave up (timeout) or never existed
            warn!(
                "Dropping scorer reply for unknown request id {}",
                request_id
            );
        }
    }
}

/// Mock scorer client for testing
#[derive(Default)]
pub struct MockScorerClient {
    pending: PendingRequests,
    published: Mutex<Vec<ScorerRequest>>,
    shutdowns: Mutex<usize>,
    fail_publish: bool,
}

impl MockScorerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose publish attempts always fail
    pub fn failing() -> Self {
        Self {
            fail_publish: true,
            ..Self::default()
        }
    }

    /// Requests published so far (for assertions)
    pub fn published_requests(&self) -> Vec<ScorerRequest> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Inject a reply, as the broker consumer would. Returns false when the
    /// correlation id has no waiter (late reply is dropped).
    pub fn inject_reply(&self, reply: ScorerReply) -> bool {
        self.pending.resolve(reply)
    }

    /// Number of pending entries (for eviction assertions)
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Times `shutdown` has been called (for lifecycle assertions)
    pub fn shutdown_calls(&self) -> usize {
        self.shutdowns.lock().map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl ScorerClient for MockScorerClient {
    fn register(&self, request_id: Uuid) -> oneshot::Receiver<ScorerReply> {
        self.pending.register(request_id)
    }

    fn abandon(&self, request_id: &Uuid) {
        self.pending.abandon(request_id);
    }

    async fn publish(&self, request: &ScorerRequest) -> Result<()> {
        if self.fail_publish {
            return Err(MatchmakingError::ScorerFailure {
                reason: "mock publish failure".to_string(),
            }
            .into());
        }

        if let Ok(mut published) = self.published.lock() {
            published.push(request.clone());
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Ok(mut count) = self.shutdowns.lock() {
            *count += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pending_resolution() {
        let pending = PendingRequests::new();
        let request_id = Uuid::new_v4();
        let rx = pending.register(request_id);

        assert!(pending.resolve(ScorerReply {
            request_id,
            teams: Some(vec![]),
            error: None,
        }));

        let reply = rx.await.unwrap();
        assert_eq!(reply.request_id, request_id);
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test]
    async fn test_late_reply_dropped() {
        let pending = PendingRequests::new();
        let request_id = Uuid::new_v4();

        let rx = pending.register(request_id);
        pending.abandon(&request_id);
        drop(rx);

        // The entry was evicted on abandon, so a late reply has no waiter
        assert!(!pending.resolve(ScorerReply {
            request_id,
            teams: Some(vec![]),
            error: None,
        }));
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test]
    async fn test_mock_client_records_requests() {
        let client = MockScorerClient::new();
        let request = ScorerRequest {
            request_id: Uuid::new_v4(),
            teams: vec![],
        };

        client.publish(&request).await.unwrap();

        let published = client.published_requests();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].request_id, request.request_id);
    }

    #[tokio::test]
    async fn test_failing_mock_client() {
        let client = MockScorerClient::failing();
        let request = ScorerRequest {
            request_id: Uuid::new_v4(),
            teams: vec![],
        };

        assert!(client.publish(&request).await.is_err());
    }
}
