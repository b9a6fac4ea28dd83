//! Comment create/edit/delete handlers (author-only mutations).

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::comments::CommentWriteError;
use crate::application::error::ErrorReport;
use crate::presentation::views::{
    CommentFormView, CommentPageTemplate, CommentPageView, LayoutContext, ViewerView,
    render_csrf_failure_response, render_not_found_response, render_server_error_response,
    render_template_response,
};

use super::auth::redirect_to_login;
use super::{CurrentUser, HttpState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CommentForm {
    text: String,
    csrf_token: String,
}

fn detail_redirect(post_id: Uuid) -> Response {
    Redirect::to(&format!("/posts/{post_id}/")).into_response()
}

fn comment_error_response(
    source: &'static str,
    viewer: ViewerView,
    err: CommentWriteError,
) -> Response {
    match err {
        CommentWriteError::NotFound => render_not_found_response(viewer),
        // Denial is a silent redirect to the parent post.
        CommentWriteError::NotAuthor { post_id } => detail_redirect(post_id),
        CommentWriteError::EmptyText => render_not_found_response(viewer),
        CommentWriteError::Repo(repo_err) => render_server_error_response(
            viewer,
            ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, &repo_err),
        ),
    }
}

fn comment_page(
    current: &CurrentUser,
    post_id: Uuid,
    action: String,
    text: String,
    errors: Vec<String>,
    deleting: bool,
) -> Response {
    let content = CommentPageView {
        post_id: post_id.to_string(),
        form: CommentFormView {
            action,
            text,
            errors,
            csrf_token: current.csrf_token().unwrap_or_default(),
        },
        deleting,
    };
    render_template_response(
        CommentPageTemplate {
            view: LayoutContext::new(current.viewer_view(), content),
        },
        StatusCode::OK,
    )
}

pub(crate) async fn create(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(post_id): Path<Uuid>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(user) = current.user().cloned() else {
        return redirect_to_login();
    };
    if !current.verify_csrf(&form.csrf_token) {
        return render_csrf_failure_response(current.viewer_view());
    }

    match state.comments.create(post_id, user.id, form.text.clone()).await {
        Ok(_) => detail_redirect(post_id),
        Err(CommentWriteError::EmptyText) => comment_page(
            &current,
            post_id,
            format!("/posts/{post_id}/comment/"),
            form.text,
            vec!["Comment text must not be empty.".to_string()],
            false,
        ),
        Err(err) => {
            comment_error_response("infra::http::comments::create", current.viewer_view(), err)
        }
    }
}

pub(crate) async fn edit_form(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Response {
    if current.user().is_none() {
        return redirect_to_login();
    }

    match state
        .comments
        .load_for_edit(post_id, comment_id, current.viewer())
        .await
    {
        Ok(comment) => comment_page(
            &current,
            post_id,
            format!("/posts/{post_id}/edit_comment/{comment_id}/"),
            comment.text,
            Vec::new(),
            false,
        ),
        Err(err) => comment_error_response(
            "infra::http::comments::edit_form",
            current.viewer_view(),
            err,
        ),
    }
}

pub(crate) async fn update(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Form(form): Form<CommentForm>,
) -> Response {
    if current.user().is_none() {
        return redirect_to_login();
    }
    if !current.verify_csrf(&form.csrf_token) {
        return render_csrf_failure_response(current.viewer_view());
    }

    match state
        .comments
        .update(post_id, comment_id, current.viewer(), form.text.clone())
        .await
    {
        Ok(_) => detail_redirect(post_id),
        Err(CommentWriteError::EmptyText) => comment_page(
            &current,
            post_id,
            format!("/posts/{post_id}/edit_comment/{comment_id}/"),
            form.text,
            vec!["Comment text must not be empty.".to_string()],
            false,
        ),
        Err(err) => {
            comment_error_response("infra::http::comments::update", current.viewer_view(), err)
        }
    }
}

pub(crate) async fn delete_confirm(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Response {
    if current.user().is_none() {
        return redirect_to_login();
    }

    match state
        .comments
        .load_for_edit(post_id, comment_id, current.viewer())
        .await
    {
        Ok(comment) => comment_page(
            &current,
            post_id,
            format!("/posts/{post_id}/delete_comment/{comment_id}/"),
            comment.text,
            Vec::new(),
            true,
        ),
        Err(err) => comment_error_response(
            "infra::http::comments::delete_confirm",
            current.viewer_view(),
            err,
        ),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ConfirmForm {
    csrf_token: String,
}

pub(crate) async fn delete(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Form(form): Form<ConfirmForm>,
) -> Response {
    if current.user().is_none() {
        return redirect_to_login();
    }
    if !current.verify_csrf(&form.csrf_token) {
        return render_csrf_failure_response(current.viewer_view());
    }

    match state
        .comments
        .delete(post_id, comment_id, current.viewer())
        .await
    {
        Ok(()) => detail_redirect(post_id),
        Err(err) => {
            comment_error_response("infra::http::comments::delete", current.viewer_view(), err)
        }
    }
}
