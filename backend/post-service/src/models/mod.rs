/// Data models for post-service
///
/// - `Post`: a post and its denormalized like count
/// - `Like`: one user's like on one post, unique per (post, user)
/// - `PostPage`: a page of posts plus the total row count
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub image_url: Option<String>,
    pub likes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Like {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input for a post insert; timestamps and id are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total: i64,
}

/// Display name for an author.
///
/// There is no user-profile lookup yet, so the name is derived from the id.
pub fn author_display_name(author_id: &str) -> String {
    format!("User {}", author_id)
}
