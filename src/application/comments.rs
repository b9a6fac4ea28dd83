//! Write-side comment operations, gated by the ownership decision.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, PostsRepo, RepoError,
};
use crate::domain::entities::CommentRecord;
use crate::domain::ownership;
use crate::domain::visibility::Viewer;

#[derive(Debug, Error)]
pub enum CommentWriteError {
    #[error("comment or post not found")]
    NotFound,
    /// Denied actors land on the parent post's detail page.
    #[error("actor is not the author of the comment on post {post_id}")]
    NotAuthor { post_id: Uuid },
    #[error("comment text must not be empty")]
    EmptyText,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    writer: Arc<dyn CommentsWriteRepo>,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        writer: Arc<dyn CommentsWriteRepo>,
    ) -> Self {
        Self {
            posts,
            comments,
            writer,
        }
    }

    /// Attach a comment to an existing post as the acting user.
    pub async fn create(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> Result<CommentRecord, CommentWriteError> {
        let text = non_empty(text)?;

        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or(CommentWriteError::NotFound)?;

        let record = self
            .writer
            .create_comment(CreateCommentParams {
                text,
                post_id,
                author_id,
            })
            .await?;
        Ok(record)
    }

    /// Loads a comment addressed as `/posts/{post}/…/{comment}` for its
    /// author; anyone else is denied before the form is shown.
    pub async fn load_for_edit(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        actor: Viewer,
    ) -> Result<CommentRecord, CommentWriteError> {
        let comment = self
            .comments
            .find_for_post(post_id, comment_id)
            .await?
            .ok_or(CommentWriteError::NotFound)?;

        if !ownership::authorize(comment.author_id, actor).is_granted() {
            return Err(CommentWriteError::NotAuthor { post_id });
        }
        Ok(comment)
    }

    pub async fn update(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        actor: Viewer,
        text: String,
    ) -> Result<CommentRecord, CommentWriteError> {
        let comment = self.load_for_edit(post_id, comment_id, actor).await?;
        let text = non_empty(text)?;
        let record = self.writer.update_comment(comment.id, text).await?;
        Ok(record)
    }

    pub async fn delete(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        actor: Viewer,
    ) -> Result<(), CommentWriteError> {
        let comment = self.load_for_edit(post_id, comment_id, actor).await?;
        self.writer.delete_comment(comment.id).await?;
        Ok(())
    }
}

fn non_empty(text: String) -> Result<String, CommentWriteError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CommentWriteError::EmptyText);
    }
    Ok(trimmed.to_string())
}
