/// Post service - owns consistency between the store, the cache and the event bus
///
/// The store is authoritative. Cache reads degrade to store reads on any error,
/// and cache writes, invalidations and event publishes run only after the store
/// step succeeded; their failures are logged and never change the result.
use crate::cache::PostCache;
use crate::db::PostStore;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{EventBus, EventSubscription, PostEvent};
use crate::models::{author_display_name, NewPost, Post, PostPage};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_RECENT_LIMIT: usize = 10;

pub struct PostService {
    store: Arc<dyn PostStore>,
    cache: Arc<dyn PostCache>,
    events: Arc<dyn EventBus>,
    recent_limit: usize,
}

impl PostService {
    pub fn new(
        store: Arc<dyn PostStore>,
        cache: Arc<dyn PostCache>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            cache,
            events,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    /// Override the size of the cached recent-posts list
    pub fn with_recent_limit(mut self, recent_limit: usize) -> Self {
        self.recent_limit = recent_limit.max(1);
        self
    }

    /// List posts newest-first.
    ///
    /// A non-empty cached recent-posts list is returned as-is and pagination is
    /// ignored; `total` is then the length of that list.
    pub async fn list_posts(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> ServiceResult<PostPage> {
        match self.cache.get_recent_posts().await {
            Ok(Some(posts)) if !posts.is_empty() => {
                let total = posts.len() as i64;
                return Ok(PostPage { posts, total });
            }
            Ok(_) => {}
            Err(err) => warn!("recent posts cache read failed: {}", err),
        }

        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_PAGE_SIZE),
            _ => DEFAULT_PAGE_SIZE,
        };
        let offset = offset.unwrap_or(0).max(0);

        let posts = self.store.list_posts(limit, offset).await?;
        let total = self.store.count_posts().await?;

        if !posts.is_empty() {
            self.refresh_recent_posts(&posts, limit, offset).await;
        }

        Ok(PostPage { posts, total })
    }

    /// Get a post by its id. Malformed ids are reported as not found.
    pub async fn get_post(&self, post_id: &str) -> ServiceResult<Post> {
        let post_id = parse_post_id(post_id)?;

        match self.cache.get_post(post_id).await {
            Ok(Some(post)) => return Ok(post),
            Ok(None) => {}
            Err(err) => warn!(%post_id, "post cache read failed: {}", err),
        }

        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("post not found".to_string()))?;

        if let Err(err) = self.cache.set_post(&post).await {
            debug!(%post_id, "post cache set failed: {}", err);
        }

        Ok(post)
    }

    /// Create a new post
    pub async fn create_post(
        &self,
        content: &str,
        author_id: &str,
        image_url: Option<String>,
    ) -> ServiceResult<Post> {
        if content.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "content cannot be empty".to_string(),
            ));
        }
        if author_id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "author_id is required".to_string(),
            ));
        }

        let new_post = NewPost {
            content: content.to_string(),
            author_id: author_id.to_string(),
            author_name: author_display_name(author_id),
            image_url: image_url.filter(|url| !url.trim().is_empty()),
        };

        let post = self.store.insert_post(new_post).await?;
        info!(post_id = %post.id, author_id = %post.author_id, "post created");

        if let Err(err) = self.cache.set_post(&post).await {
            debug!(post_id = %post.id, "post cache set failed: {}", err);
        }
        self.publish(PostEvent::created(&post)).await;

        Ok(post)
    }

    /// Like a post on behalf of `user_id`.
    ///
    /// The existence check up front only short-circuits the common duplicate;
    /// the store's uniqueness constraint inside the like transaction is what
    /// rejects a concurrent duplicate.
    pub async fn like_post(&self, post_id: &str, user_id: &str) -> ServiceResult<Post> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "user_id is required".to_string(),
            ));
        }
        let post_id = parse_post_id(post_id)?;

        if self.store.find_like(post_id, user_id).await?.is_some() {
            return Err(ServiceError::AlreadyExists(
                "user already liked this post".to_string(),
            ));
        }

        let post = self.store.like_post(post_id, user_id).await?;
        info!(%post_id, user_id, likes = post.likes, "post liked");

        if let Err(err) = self.cache.invalidate_post(post_id).await {
            warn!(%post_id, "post cache invalidation failed: {}", err);
        }
        self.publish(PostEvent::liked(&post, user_id)).await;

        Ok(post)
    }

    /// Subscribe to post events published from now on
    pub async fn subscribe(&self) -> ServiceResult<EventSubscription> {
        self.events.subscribe().await
    }

    async fn publish(&self, event: PostEvent) {
        if let Err(err) = self.events.publish(&event).await {
            warn!(
                post_id = %event.post_id(),
                event_type = event.event_type(),
                "post event publish failed: {}",
                err
            );
        }
    }

    /// Write the newest `recent_limit` posts to the cache.
    ///
    /// The page is reused when it is known to start at the newest post and to
    /// cover the whole window; otherwise the window is read separately.
    async fn refresh_recent_posts(&self, page: &[Post], limit: i64, offset: i64) {
        let page_covers_window =
            offset == 0 && (page.len() >= self.recent_limit || (page.len() as i64) < limit);

        let recent = if page_covers_window {
            page.iter().take(self.recent_limit).cloned().collect::<Vec<_>>()
        } else {
            match self.store.list_posts(self.recent_limit as i64, 0).await {
                Ok(posts) => posts,
                Err(err) => {
                    debug!("recent posts reload failed: {}", err);
                    return;
                }
            }
        };

        if let Err(err) = self.cache.set_recent_posts(&recent).await {
            debug!("recent posts cache set failed: {}", err);
        }
    }
}

fn parse_post_id(raw: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::NotFound("post not found".to_string()))
}
