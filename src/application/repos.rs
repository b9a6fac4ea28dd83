//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::entities::{
    CategoryRecord, CommentRecord, CommentWithAuthor, LocationRecord, PostRecord, PostWithMeta,
    SessionRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Visibility regime a post listing is composed under.
///
/// `Public` applies the three-part publication predicate; `OwnProfile`
/// applies none (the owner sees unpublished and future-dated posts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostListScope {
    Public,
    OwnProfile,
}

/// Fully-specified description of a post listing: scope plus optional
/// category/author filters. Built once by the read service, evaluated
/// once by the repository.
#[derive(Debug, Clone, Copy)]
pub struct PostQuery {
    pub scope: PostListScope,
    pub category_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
}

impl PostQuery {
    pub fn public() -> Self {
        Self {
            scope: PostListScope::Public,
            category_id: None,
            author_id: None,
        }
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_author(mut self, author_id: Uuid) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn own_profile(author_id: Uuid) -> Self {
        Self {
            scope: PostListScope::OwnProfile,
            category_id: None,
            author_id: Some(author_id),
        }
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// List posts matching the query, ordered by `pub_date DESC, title ASC`,
    /// each annotated with its comment count.
    async fn list_posts(
        &self,
        query: &PostQuery,
        page: PageRequest,
    ) -> Result<Vec<PostWithMeta>, RepoError>;

    async fn count_posts(&self, query: &PostQuery) -> Result<u64, RepoError>;

    async fn find_with_meta(&self, id: Uuid) -> Result<Option<PostWithMeta>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author_id: Uuid,
    pub location_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub image_path: Option<String>,
    pub is_published: bool,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub location_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub image_path: Option<String>,
    pub is_published: bool,
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    /// Removes the post; its comments go with it (storage cascade).
    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn find_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<CategoryRecord>, RepoError>;

    /// Published categories for the post form's select, ordered by title.
    async fn list_published(&self) -> Result<Vec<CategoryRecord>, RepoError>;
}

#[async_trait]
pub trait LocationsRepo: Send + Sync {
    /// Published locations for the post form's select, ordered by name.
    async fn list_published(&self) -> Result<Vec<LocationRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Chronological thread for a post, oldest first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>, RepoError>;

    /// A comment addressed through its post; `None` when the comment does
    /// not exist or belongs to a different post.
    async fn find_for_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Option<CommentRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub text: String,
    pub post_id: Uuid,
    pub author_id: Uuid,
}

#[async_trait]
pub trait CommentsWriteRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    async fn update_comment(&self, id: Uuid, text: String) -> Result<CommentRecord, RepoError>;

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileParams {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn insert_session(&self, session: SessionRecord) -> Result<(), RepoError>;

    /// Resolve an unexpired session to its user.
    async fn find_user_by_token_hash(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<UserRecord>, RepoError>;

    /// Missing rows are treated as success: logout is idempotent.
    async fn delete_session(&self, token_hash: &str) -> Result<(), RepoError>;
}
