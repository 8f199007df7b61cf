use crate::models::{Like, Post};
use sqlx::PgPool;
use uuid::Uuid;

/// Result of the like transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeOutcome {
    /// Like recorded; carries the post with its post-commit like count.
    Liked(Post),
    /// A like for (post, user) already exists; nothing was written.
    AlreadyLiked,
    /// The post does not exist or is soft-deleted; nothing was written.
    PostNotFound,
}

/// Check if a user has liked a post
pub async fn find_like(
    pool: &PgPool,
    post_id: Uuid,
    user_id: &str,
) -> Result<Option<Like>, sqlx::Error> {
    let like = sqlx::query_as::<_, Like>(
        r#"
        SELECT id, post_id, user_id, created_at
        FROM post_likes
        WHERE post_id = $1 AND user_id = $2
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(like)
}

/// Record a like and bump the post's counter in one transaction.
///
/// The UNIQUE (post_id, user_id) constraint decides duplicates: a concurrent
/// duplicate blocks on the index entry and then fails with a unique violation.
/// The counter uses an in-place increment under the row lock so concurrent
/// likes from different users serialize on the post row.
pub async fn like_post(
    pool: &PgPool,
    post_id: Uuid,
    user_id: &str,
) -> Result<LikeOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO post_likes (post_id, user_id)
        VALUES ($1, $2)
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await;

    if let Err(err) = inserted {
        let outcome = match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Some(LikeOutcome::AlreadyLiked)
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Some(LikeOutcome::PostNotFound)
            }
            _ => None,
        };
        tx.rollback().await?;
        return match outcome {
            Some(outcome) => Ok(outcome),
            None => Err(err),
        };
    }

    let post = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET likes = likes + 1, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING id, content, author_id, author_name, image_url, likes,
                  created_at, updated_at, deleted_at
        "#,
    )
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?;

    match post {
        Some(post) => {
            tx.commit().await?;
            Ok(LikeOutcome::Liked(post))
        }
        None => {
            // Soft-deleted rows still satisfy the foreign key
            tx.rollback().await?;
            Ok(LikeOutcome::PostNotFound)
        }
    }
}

/// Count like records for a post
pub async fn count_likes_by_post(pool: &PgPool, post_id: Uuid) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
