//! HTTP surface: router, state, middleware and handlers.

mod accounts;
mod auth;
mod blog;
mod comments;
mod middleware;
mod posts;

pub use auth::{CurrentUser, SESSION_COOKIE};

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use sqlx::Error as SqlxError;

use crate::application::accounts::AccountService;
use crate::application::comments::CommentService;
use crate::application::error::ErrorReport;
use crate::application::feed::FeedService;
use crate::application::posts::PostService;
use crate::infra::assets;
use crate::infra::db::PostgresRepositories;
use crate::infra::media::MediaStorage;
use crate::presentation::views::render_not_found_response;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub accounts: Arc<AccountService>,
    pub media: Arc<MediaStorage>,
    pub db: Arc<PostgresRepositories>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(blog::index))
        .route("/category/{slug}/", get(blog::category_posts))
        .route("/profile/{username}/", get(blog::profile))
        .route(
            "/posts/create/",
            get(posts::create_form).post(posts::create),
        )
        .route("/posts/{id}/", get(blog::post_detail))
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::update),
        )
        .route(
            "/posts/{id}/delete/",
            get(posts::delete_confirm).post(posts::delete),
        )
        .route("/posts/{id}/comment/", axum::routing::post(comments::create))
        .route(
            "/posts/{id}/edit_comment/{comment_id}/",
            get(comments::edit_form).post(comments::update),
        )
        .route(
            "/posts/{id}/delete_comment/{comment_id}/",
            get(comments::delete_confirm).post(comments::delete),
        )
        .route(
            "/personal_info/",
            get(accounts::profile_form).post(accounts::update_profile),
        )
        .route(
            "/auth/login/",
            get(accounts::login_form).post(accounts::login),
        )
        .route("/auth/logout/", get(accounts::logout))
        .route(
            "/auth/registration/",
            get(accounts::registration_form).post(accounts::register),
        )
        .route("/media/{*path}", get(blog::serve_media))
        .route("/static/{*path}", get(serve_static_asset))
        .route("/_health/db", get(db_health))
        .fallback(fallback_not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn serve_static_asset(path: Option<axum::extract::Path<String>>) -> Response {
    assets::serve_static(path).await
}

async fn db_health(
    axum::extract::State(state): axum::extract::State<HttpState>,
) -> Response {
    db_health_response(state.db.health_check().await)
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn fallback_not_found(current: CurrentUser) -> Response {
    render_not_found_response(current.viewer_view())
}
