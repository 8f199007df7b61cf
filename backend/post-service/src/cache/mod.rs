/// Post caching layer
///
/// Cache entries are advisory: a miss or an error only costs a store read.
/// - `post:{id}`: snapshot of a single post
/// - `recent_posts`: newest-first list of the most recent posts
///
/// Both kinds share one TTL and are deleted together when a post is liked.
pub mod post_cache;

pub use post_cache::RedisPostCache;

use crate::error::ServiceResult;
use crate::models::Post;
use async_trait::async_trait;
use uuid::Uuid;

pub const RECENT_POSTS_KEY: &str = "recent_posts";

pub fn post_key(post_id: Uuid) -> String {
    format!("post:{}", post_id)
}

#[async_trait]
pub trait PostCache: Send + Sync {
    /// `Ok(None)` on a miss
    async fn get_recent_posts(&self) -> ServiceResult<Option<Vec<Post>>>;

    async fn set_recent_posts(&self, posts: &[Post]) -> ServiceResult<()>;

    async fn get_post(&self, post_id: Uuid) -> ServiceResult<Option<Post>>;

    async fn set_post(&self, post: &Post) -> ServiceResult<()>;

    /// Drop the post's snapshot and the recent-posts list
    async fn invalidate_post(&self, post_id: Uuid) -> ServiceResult<()>;
}
