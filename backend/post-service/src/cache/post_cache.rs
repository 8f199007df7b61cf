use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{post_key, PostCache, RECENT_POSTS_KEY};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::{POST_CACHE_EVENTS, POST_CACHE_WRITE_TOTAL};
use crate::models::Post;

/// Post cache backed by Redis
#[derive(Clone)]
pub struct RedisPostCache {
    redis: ConnectionManager,
    ttl: Duration,
}

impl RedisPostCache {
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self {
            redis,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    async fn read_json<T>(&self, key: &str, kind: &str) -> ServiceResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut conn = self.redis.clone();

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => {
                debug!(key, "Post cache HIT");
                POST_CACHE_EVENTS.with_label_values(&[kind, "hit"]).inc();
                serde_json::from_str::<T>(&data).map(Some).map_err(|e| {
                    error!(key, "Failed to deserialize cached entry: {}", e);
                    POST_CACHE_EVENTS.with_label_values(&[kind, "error"]).inc();
                    ServiceError::Cache(format!("Cache deserialization error: {}", e))
                })
            }
            Ok(None) => {
                debug!(key, "Post cache MISS");
                POST_CACHE_EVENTS.with_label_values(&[kind, "miss"]).inc();
                Ok(None)
            }
            Err(e) => {
                warn!(key, "Redis read error for post cache: {}", e);
                POST_CACHE_EVENTS.with_label_values(&[kind, "error"]).inc();
                Err(ServiceError::Cache(e.to_string()))
            }
        }
    }

    async fn write_json<T>(&self, key: &str, kind: &str, value: &T) -> ServiceResult<()>
    where
        T: serde::Serialize + ?Sized,
    {
        let data = serde_json::to_string(value).map_err(|e| {
            error!(key, "Failed to serialize cache entry: {}", e);
            ServiceError::Cache(format!("Cache serialization error: {}", e))
        })?;

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(key, data, self.ttl.as_secs())
            .await
            .map_err(|e| {
                warn!(key, "Failed to write post cache: {}", e);
                POST_CACHE_WRITE_TOTAL
                    .with_label_values(&[kind, "error"])
                    .inc();
                ServiceError::Cache(e.to_string())
            })?;

        debug!(key, ttl = ?self.ttl, "Post cache WRITE");
        POST_CACHE_WRITE_TOTAL
            .with_label_values(&[kind, "success"])
            .inc();

        Ok(())
    }
}

#[async_trait]
impl PostCache for RedisPostCache {
    async fn get_recent_posts(&self) -> ServiceResult<Option<Vec<Post>>> {
        self.read_json(RECENT_POSTS_KEY, "recent").await
    }

    async fn set_recent_posts(&self, posts: &[Post]) -> ServiceResult<()> {
        self.write_json(RECENT_POSTS_KEY, "recent", posts).await
    }

    async fn get_post(&self, post_id: Uuid) -> ServiceResult<Option<Post>> {
        self.read_json(&post_key(post_id), "post").await
    }

    async fn set_post(&self, post: &Post) -> ServiceResult<()> {
        self.write_json(&post_key(post.id), "post", post).await
    }

    async fn invalidate_post(&self, post_id: Uuid) -> ServiceResult<()> {
        let keys = [post_key(post_id), RECENT_POSTS_KEY.to_string()];
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(&keys[..]).await.map_err(|e| {
            POST_CACHE_WRITE_TOTAL
                .with_label_values(&["invalidate", "error"])
                .inc();
            ServiceError::Cache(e.to_string())
        })?;

        debug!(%post_id, "Post cache INVALIDATE");
        POST_CACHE_WRITE_TOTAL
            .with_label_values(&["invalidate", "success"])
            .inc();

        Ok(())
    }
}
