use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, error, info};

use super::{EventBus, EventSubscription, PostEvent};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::POST_EVENTS_PUBLISHED_TOTAL;

/// Event bus on Redis Pub/Sub
///
/// Publishing shares one managed connection; every subscriber gets its own
/// pub/sub connection, which closes when the subscription stream is dropped.
#[derive(Clone)]
pub struct RedisEventBus {
    client: Client,
    publisher: ConnectionManager,
    topic_prefix: String,
}

impl RedisEventBus {
    pub async fn new(redis_url: &str, topic_prefix: impl Into<String>) -> ServiceResult<Self> {
        let client = Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;

        Ok(Self {
            client,
            publisher,
            topic_prefix: topic_prefix.into(),
        })
    }

    fn pattern(&self) -> String {
        format!("{}.*", self.topic_prefix)
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, event: &PostEvent) -> ServiceResult<()> {
        let channel = event.topic(&self.topic_prefix);
        let payload = event.encode()?;

        let mut conn = self.publisher.clone();
        let subscribers: usize = conn.publish(&channel, payload).await.map_err(|e| {
            POST_EVENTS_PUBLISHED_TOTAL
                .with_label_values(&[event.event_type(), "error"])
                .inc();
            ServiceError::EventBus(e.to_string())
        })?;

        POST_EVENTS_PUBLISHED_TOTAL
            .with_label_values(&[event.event_type(), "success"])
            .inc();
        debug!(
            channel = %channel,
            post_id = %event.post_id(),
            subscribers,
            "Post event published"
        );

        Ok(())
    }

    async fn subscribe(&self) -> ServiceResult<EventSubscription> {
        let pattern = self.pattern();
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(&pattern).await?;

        info!(pattern = %pattern, "Subscribed to post events");

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let channel = msg.get_channel_name().to_string();
            let payload = match msg.get_payload::<String>() {
                Ok(p) => p,
                Err(e) => {
                    error!(error = ?e, channel = %channel, "Failed to get message payload");
                    return None;
                }
            };

            match PostEvent::decode(&channel, &payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    error!(error = %e, channel = %channel, "Failed to decode post event");
                    None
                }
            }
        });

        Ok(stream.boxed())
    }
}
