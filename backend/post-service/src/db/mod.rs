//! Database access layer
//!
//! `PostStore` is the authoritative store for posts and like records.
//! `PgPostStore` implements it on PostgreSQL; the repository modules hold the SQL.

pub mod like_repo;
pub mod post_repo;

use crate::config::DatabaseConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Like, NewPost, Post};
use async_trait::async_trait;
use like_repo::LikeOutcome;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Newest-first page of visible posts
    async fn list_posts(&self, limit: i64, offset: i64) -> ServiceResult<Vec<Post>>;

    /// Total number of visible posts
    async fn count_posts(&self) -> ServiceResult<i64>;

    async fn find_post(&self, post_id: Uuid) -> ServiceResult<Option<Post>>;

    async fn insert_post(&self, new_post: NewPost) -> ServiceResult<Post>;

    async fn find_like(&self, post_id: Uuid, user_id: &str) -> ServiceResult<Option<Like>>;

    /// Insert the like record and increment the post's counter atomically.
    ///
    /// Returns `NotFound` for a missing post and `AlreadyExists` when the
    /// (post, user) pair is already recorded. Either way nothing is written.
    async fn like_post(&self, post_id: Uuid, user_id: &str) -> ServiceResult<Post>;

    /// Number of like records for a post.
    ///
    /// Not on any request path; integration tests use it to check the counter
    /// against the like table.
    async fn count_likes(&self, post_id: Uuid) -> ServiceResult<i64>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn list_posts(&self, limit: i64, offset: i64) -> ServiceResult<Vec<Post>> {
        Ok(post_repo::find_recent_posts(&self.pool, limit, offset).await?)
    }

    async fn count_posts(&self) -> ServiceResult<i64> {
        Ok(post_repo::count_posts(&self.pool).await?)
    }

    async fn find_post(&self, post_id: Uuid) -> ServiceResult<Option<Post>> {
        Ok(post_repo::find_post_by_id(&self.pool, post_id).await?)
    }

    async fn insert_post(&self, new_post: NewPost) -> ServiceResult<Post> {
        Ok(post_repo::create_post(&self.pool, &new_post).await?)
    }

    async fn find_like(&self, post_id: Uuid, user_id: &str) -> ServiceResult<Option<Like>> {
        Ok(like_repo::find_like(&self.pool, post_id, user_id).await?)
    }

    async fn like_post(&self, post_id: Uuid, user_id: &str) -> ServiceResult<Post> {
        match like_repo::like_post(&self.pool, post_id, user_id).await? {
            LikeOutcome::Liked(post) => Ok(post),
            LikeOutcome::AlreadyLiked => Err(ServiceError::AlreadyExists(
                "user already liked this post".to_string(),
            )),
            LikeOutcome::PostNotFound => Err(ServiceError::NotFound("post not found".to_string())),
        }
    }

    async fn count_likes(&self, post_id: Uuid) -> ServiceResult<i64> {
        Ok(like_repo::count_likes_by_post(&self.pool, post_id).await?)
    }
}

/// Create the PostgreSQL pool and verify it with a round trip.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    debug!(
        "Creating database pool: max={}, min={}, acquire_timeout={}s",
        config.max_connections, config.min_connections, config.acquire_timeout_secs
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    info!("Database pool created and verified successfully");

    Ok(pool)
}

/// Apply the bundled schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
