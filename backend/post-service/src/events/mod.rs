//! Post events and the event bus they travel on
//!
//! Events are published after the store commit, at most once per mutation and
//! without delivery guarantees. Each event type has its own channel
//! (`{prefix}.created`, `{prefix}.liked`); subscribers listen on `{prefix}.*`.

pub mod redis_bus;

pub use redis_bus::RedisEventBus;

use crate::error::{ServiceError, ServiceResult};
use crate::models::Post;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub const EVENT_TYPE_CREATED: &str = "created";
pub const EVENT_TYPE_LIKED: &str = "liked";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCreatedEvent {
    pub post_id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub image_url: Option<String>,
    pub likes: i32,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLikedEvent {
    pub post_id: String,
    pub user_id: String,
    pub likes: i32,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostEvent {
    Created(PostCreatedEvent),
    Liked(PostLikedEvent),
}

/// RFC3339 in UTC with a `Z` suffix
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl PostEvent {
    pub fn created(post: &Post) -> Self {
        PostEvent::Created(PostCreatedEvent {
            post_id: post.id.to_string(),
            content: post.content.clone(),
            author_id: post.author_id.clone(),
            author_name: post.author_name.clone(),
            image_url: post.image_url.clone(),
            likes: post.likes,
            timestamp: format_timestamp(&post.created_at),
        })
    }

    pub fn liked(post: &Post, user_id: &str) -> Self {
        PostEvent::Liked(PostLikedEvent {
            post_id: post.id.to_string(),
            user_id: user_id.to_string(),
            likes: post.likes,
            timestamp: format_timestamp(&post.updated_at),
        })
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            PostEvent::Created(_) => EVENT_TYPE_CREATED,
            PostEvent::Liked(_) => EVENT_TYPE_LIKED,
        }
    }

    pub fn post_id(&self) -> &str {
        match self {
            PostEvent::Created(e) => &e.post_id,
            PostEvent::Liked(e) => &e.post_id,
        }
    }

    /// Channel name for this event under `prefix`
    pub fn topic(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self.event_type())
    }

    /// JSON payload (the channel carries the type)
    pub fn encode(&self) -> ServiceResult<String> {
        let payload = match self {
            PostEvent::Created(e) => serde_json::to_string(e)?,
            PostEvent::Liked(e) => serde_json::to_string(e)?,
        };
        Ok(payload)
    }

    /// Decode a payload received on `channel` (e.g. `post.liked`)
    pub fn decode(channel: &str, payload: &str) -> ServiceResult<Self> {
        let event_type = channel.rsplit('.').next().unwrap_or_default();
        match event_type {
            EVENT_TYPE_CREATED => Ok(PostEvent::Created(serde_json::from_str(payload)?)),
            EVENT_TYPE_LIKED => Ok(PostEvent::Liked(serde_json::from_str(payload)?)),
            other => Err(ServiceError::EventBus(format!(
                "unknown event type '{}' on channel {}",
                other, channel
            ))),
        }
    }
}

/// Stream of events for one subscriber; dropping it ends the subscription.
pub type EventSubscription = BoxStream<'static, PostEvent>;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Fire-and-forget publish
    async fn publish(&self, event: &PostEvent) -> ServiceResult<()>;

    /// Subscribe to every post event published from now on
    async fn subscribe(&self) -> ServiceResult<EventSubscription>;
}
