use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, RepoError,
};
use crate::domain::entities::{CommentRecord, CommentWithAuthor};

use super::PostgresRepositories;
use super::map_sqlx_error;

const COMMENT_COLUMNS: &str = "id, text, post_id, author_id, created_at";

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    text: String,
    post_id: Uuid,
    author_id: Uuid,
    created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        CommentRecord {
            id: row.id,
            text: row.text,
            post_id: row.post_id,
            author_id: row.author_id,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct CommentWithAuthorRow {
    id: Uuid,
    text: String,
    post_id: Uuid,
    author_id: Uuid,
    created_at: OffsetDateTime,
    author_username: String,
}

impl From<CommentWithAuthorRow> for CommentWithAuthor {
    fn from(row: CommentWithAuthorRow) -> Self {
        CommentWithAuthor {
            comment: CommentRecord {
                id: row.id,
                text: row.text,
                post_id: row.post_id,
                author_id: row.author_id,
                created_at: row.created_at,
            },
            author_username: row.author_username,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let rows = sqlx::query_as::<_, CommentWithAuthorRow>(
            "SELECT cm.id, cm.text, cm.post_id, cm.author_id, cm.created_at, \
             u.username AS author_username \
             FROM comments cm \
             JOIN users u ON u.id = cm.author_id \
             WHERE cm.post_id = $1 \
             ORDER BY cm.created_at ASC",
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentWithAuthor::from).collect())
    }

    async fn find_for_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Option<CommentRecord>, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND post_id = $2"
        ))
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CommentRecord::from))
    }
}

#[async_trait]
impl CommentsWriteRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "INSERT INTO comments (text, post_id, author_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(params.text)
        .bind(params.post_id)
        .bind(params.author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_comment(&self, id: Uuid, text: String) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "UPDATE comments SET text = $2 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(text)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(CommentRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
