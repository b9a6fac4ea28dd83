//! Write-side post operations, gated by the ownership decision.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CategoriesRepo, CreatePostParams, LocationsRepo, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams,
};
use crate::domain::entities::{CategoryRecord, LocationRecord, PostRecord, MAX_TEXT_FIELD_LEN};
use crate::domain::ownership;
use crate::domain::visibility::Viewer;

#[derive(Debug, Error)]
pub enum PostWriteError {
    #[error("post not found")]
    NotFound,
    /// Ownership denial. Carries the post id so the HTTP layer can
    /// redirect to that post's detail page instead of erroring.
    #[error("actor is not the author of post {post_id}")]
    NotAuthor { post_id: Uuid },
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Form-level input for creating or editing a post.
#[derive(Debug, Clone)]
pub struct PostInput {
    pub title: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub category_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub image_path: Option<String>,
    pub is_published: bool,
}

pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    categories: Arc<dyn CategoriesRepo>,
    locations: Arc<dyn LocationsRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        categories: Arc<dyn CategoriesRepo>,
        locations: Arc<dyn LocationsRepo>,
    ) -> Self {
        Self {
            posts,
            writer,
            categories,
            locations,
        }
    }

    /// Select options for the post form.
    pub async fn form_options(
        &self,
    ) -> Result<(Vec<CategoryRecord>, Vec<LocationRecord>), PostWriteError> {
        let categories = self.categories.list_published().await?;
        let locations = self.locations.list_published().await?;
        Ok((categories, locations))
    }

    pub async fn create(
        &self,
        author_id: Uuid,
        input: PostInput,
    ) -> Result<PostRecord, PostWriteError> {
        let input = validate(input)?;

        let record = self
            .writer
            .create_post(CreatePostParams {
                title: input.title,
                text: input.text,
                pub_date: input.pub_date,
                author_id,
                location_id: input.location_id,
                category_id: input.category_id,
                image_path: input.image_path,
                is_published: input.is_published,
            })
            .await?;
        Ok(record)
    }

    /// Loads the post for the edit form; non-authors are denied before
    /// anything is shown.
    pub async fn load_for_edit(
        &self,
        post_id: Uuid,
        actor: Viewer,
    ) -> Result<PostRecord, PostWriteError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostWriteError::NotFound)?;

        if !ownership::authorize(post.author_id, actor).is_granted() {
            return Err(PostWriteError::NotAuthor { post_id });
        }
        Ok(post)
    }

    pub async fn update(
        &self,
        post_id: Uuid,
        actor: Viewer,
        input: PostInput,
    ) -> Result<PostRecord, PostWriteError> {
        let existing = self.load_for_edit(post_id, actor).await?;
        let input = validate(input)?;

        // A submission without a fresh upload keeps the stored image.
        let image_path = input.image_path.or(existing.image_path);

        let record = self
            .writer
            .update_post(UpdatePostParams {
                id: post_id,
                title: input.title,
                text: input.text,
                pub_date: input.pub_date,
                location_id: input.location_id,
                category_id: input.category_id,
                image_path,
                is_published: input.is_published,
            })
            .await?;
        Ok(record)
    }

    pub async fn delete(&self, post_id: Uuid, actor: Viewer) -> Result<(), PostWriteError> {
        self.load_for_edit(post_id, actor).await?;
        self.writer.delete_post(post_id).await?;
        Ok(())
    }
}

fn validate(mut input: PostInput) -> Result<PostInput, PostWriteError> {
    input.title = input.title.trim().to_string();
    if input.title.is_empty() {
        return Err(PostWriteError::Validation {
            field: "title",
            message: "title must not be empty",
        });
    }
    if input.title.chars().count() > MAX_TEXT_FIELD_LEN {
        return Err(PostWriteError::Validation {
            field: "title",
            message: "title is too long",
        });
    }
    if input.text.trim().is_empty() {
        return Err(PostWriteError::Validation {
            field: "text",
            message: "text must not be empty",
        });
    }
    Ok(input)
}
