//! Public read surface: home, category, profile and post detail pages.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use std::io::ErrorKind;
use tracing::error;
use uuid::Uuid;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::FeedError;
use crate::infra::media::MediaStorageError;
use crate::presentation::views::{
    CategoryPageView, CategoryTemplate, CommentFormView, HomePageView, IndexTemplate,
    LayoutContext, PostDetailTemplate, PostDetailView, ProfilePageView, ProfileTemplate,
    ViewerView, comment_view, post_card, post_list_view, render_not_found_response,
    render_server_error_response, render_template_response,
};

use super::{CurrentUser, HttpState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// Non-numeric input falls back to page 1; out-of-range values are
    /// clamped later against the total.
    fn requested(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(1)
    }
}

pub(crate) fn feed_error_response(
    source: &'static str,
    viewer: ViewerView,
    err: FeedError,
) -> Response {
    match err {
        FeedError::NotFound => render_not_found_response(viewer),
        FeedError::Repo(repo_err) => render_server_error_response(
            viewer,
            ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, &repo_err),
        ),
    }
}

pub(crate) async fn index(
    State(state): State<HttpState>,
    current: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.home_page(query.requested()).await {
        Ok(slice) => {
            let content = HomePageView {
                list: post_list_view(&slice),
            };
            render_template_response(
                IndexTemplate {
                    view: LayoutContext::new(current.viewer_view(), content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response("infra::http::blog::index", current.viewer_view(), err),
    }
}

pub(crate) async fn category_posts(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.category_page(&slug, query.requested()).await {
        Ok((category, slice)) => {
            let content = CategoryPageView {
                title: category.title,
                description: category.description,
                list: post_list_view(&slice),
            };
            render_template_response(
                CategoryTemplate {
                    view: LayoutContext::new(current.viewer_view(), content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => {
            feed_error_response("infra::http::blog::category", current.viewer_view(), err)
        }
    }
}

pub(crate) async fn profile(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state
        .feed
        .profile_page(&username, current.viewer(), query.requested())
        .await
    {
        Ok((profile, slice)) => {
            let content = ProfilePageView {
                username: profile.username.clone(),
                display_name: profile.display_name(),
                is_owner: current.viewer().is(profile.id),
                list: post_list_view(&slice),
            };
            render_template_response(
                ProfileTemplate {
                    view: LayoutContext::new(current.viewer_view(), content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => {
            feed_error_response("infra::http::blog::profile", current.viewer_view(), err)
        }
    }
}

pub(crate) async fn post_detail(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Response {
    match state.feed.post_detail(id, current.viewer()).await {
        Ok(detail) => {
            let viewer = current.viewer();
            let comment_form = current.user().map(|_| CommentFormView {
                action: format!("/posts/{id}/comment/"),
                text: String::new(),
                errors: Vec::new(),
                csrf_token: current.csrf_token().unwrap_or_default(),
            });
            let content = PostDetailView {
                card: post_card(&detail.post),
                can_edit: viewer.is(detail.post.post.author_id),
                comments: detail
                    .comments
                    .iter()
                    .map(|comment| comment_view(comment, viewer))
                    .collect(),
                comment_form,
            };
            render_template_response(
                PostDetailTemplate {
                    view: LayoutContext::new(current.viewer_view(), content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response("infra::http::blog::detail", current.viewer_view(), err),
    }
}

pub(crate) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::blog::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(MediaStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Image not found",
            "The requested image is not available",
        )
        .into_response(),
        Err(MediaStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Image not found",
            "The requested image is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored image"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read stored image",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
