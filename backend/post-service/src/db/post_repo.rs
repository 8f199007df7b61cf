use crate::models::{NewPost, Post};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a new post with zero likes.
/// Both timestamps take the transaction's NOW(), so created_at == updated_at.
pub async fn create_post(pool: &PgPool, new_post: &NewPost) -> Result<Post, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (content, author_id, author_name, image_url, likes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 0, NOW(), NOW())
        RETURNING id, content, author_id, author_name, image_url, likes,
                  created_at, updated_at, deleted_at
        "#,
    )
    .bind(&new_post.content)
    .bind(&new_post.author_id)
    .bind(&new_post.author_name)
    .bind(&new_post.image_url)
    .fetch_one(pool)
    .await?;

    Ok(post)
}

/// Find a post by ID (excluding soft-deleted posts)
pub async fn find_post_by_id(pool: &PgPool, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, content, author_id, author_name, image_url, likes,
               created_at, updated_at, deleted_at
        FROM posts
        WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

/// Newest-first page of posts (excluding soft-deleted)
pub async fn find_recent_posts(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, content, author_id, author_name, image_url, likes,
               created_at, updated_at, deleted_at
        FROM posts
        WHERE deleted_at IS NULL
        ORDER BY created_at DESC, id DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(posts)
}

/// Count all visible posts, independent of any page window
pub async fn count_posts(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE deleted_at IS NULL")
        .fetch_one(pool)
        .await?;

    Ok(total)
}
