//! Read-side service: post listings and the viewer-gated detail page.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, PageSlice};
use crate::application::repos::{
    CategoriesRepo, CommentsRepo, PostQuery, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CategoryRecord, CommentWithAuthor, PostWithMeta, UserRecord};
use crate::domain::visibility::{self, Viewer};

#[derive(Debug, Error)]
pub enum FeedError {
    /// Absent and invisible collapse into the same outcome on purpose:
    /// the response must not reveal that a hidden resource exists.
    #[error("resource not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct PostDetailPage {
    pub post: PostWithMeta,
    pub comments: Vec<CommentWithAuthor>,
}

pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    comments: Arc<dyn CommentsRepo>,
    users: Arc<dyn UsersRepo>,
    page_size: u32,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        comments: Arc<dyn CommentsRepo>,
        users: Arc<dyn UsersRepo>,
        page_size: u32,
    ) -> Self {
        Self {
            posts,
            categories,
            comments,
            users,
            page_size,
        }
    }

    pub async fn home_page(&self, page: u32) -> Result<PageSlice<PostWithMeta>, FeedError> {
        self.list(&PostQuery::public(), page).await
    }

    /// Category listing. An unknown or unpublished category is NotFound.
    pub async fn category_page(
        &self,
        slug: &str,
        page: u32,
    ) -> Result<(CategoryRecord, PageSlice<PostWithMeta>), FeedError> {
        let category = self
            .categories
            .find_published_by_slug(slug)
            .await?
            .ok_or(FeedError::NotFound)?;

        let query = PostQuery::public().with_category(category.id);
        let slice = self.list(&query, page).await?;
        Ok((category, slice))
    }

    /// Profile listing: the owner sees all their posts, everyone else the
    /// public subset.
    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Viewer,
        page: u32,
    ) -> Result<(UserRecord, PageSlice<PostWithMeta>), FeedError> {
        let profile = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::NotFound)?;

        let query = if viewer.is(profile.id) {
            PostQuery::own_profile(profile.id)
        } else {
            PostQuery::public().with_author(profile.id)
        };
        let slice = self.list(&query, page).await?;
        Ok((profile, slice))
    }

    /// Detail page. A post the viewer may not see is NotFound, same as a
    /// post that does not exist.
    pub async fn post_detail(
        &self,
        id: Uuid,
        viewer: Viewer,
    ) -> Result<PostDetailPage, FeedError> {
        let post = self
            .posts
            .find_with_meta(id)
            .await?
            .ok_or(FeedError::NotFound)?;

        if !visibility::is_visible_to(&post, viewer, OffsetDateTime::now_utc()) {
            return Err(FeedError::NotFound);
        }

        let comments = self.comments.list_for_post(post.post.id).await?;
        Ok(PostDetailPage { post, comments })
    }

    async fn list(
        &self,
        query: &PostQuery,
        requested_page: u32,
    ) -> Result<PageSlice<PostWithMeta>, FeedError> {
        let total = self.posts.count_posts(query).await?;
        let page = PageRequest::clamped(requested_page, self.page_size, total);
        let items = self.posts.list_posts(query, page).await?;
        Ok(PageSlice::new(items, page, total))
    }
}
