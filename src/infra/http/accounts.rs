//! Login, logout, registration and profile editing.

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;

use crate::application::accounts::{AccountError, RegisterCommand, UpdateProfileCommand};
use crate::application::error::ErrorReport;
use crate::presentation::views::{
    EmptyView, LayoutContext, LoggedOutTemplate, LoginFormView, LoginTemplate, ProfileFormTemplate,
    ProfileFormView, RegistrationFormView, RegistrationTemplate, ViewerView,
    render_csrf_failure_response, render_server_error_response, render_template_response,
};

use super::auth::redirect_to_login;
use super::{CurrentUser, HttpState, SESSION_COOKIE};

fn account_error_message(err: &AccountError) -> String {
    match err {
        AccountError::UsernameTaken => "This username is already taken.".to_string(),
        AccountError::InvalidCredentials => "Invalid username or password.".to_string(),
        AccountError::Validation { field, message } => format!("{field}: {message}"),
        AccountError::Repo(_) => "Something went wrong, please try again.".to_string(),
    }
}

fn repo_failure_response(source: &'static str, viewer: ViewerView, err: &AccountError) -> Response {
    render_server_error_response(
        viewer,
        ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, err),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoginForm {
    username: String,
    password: String,
}

pub(crate) async fn login_form(current: CurrentUser) -> Response {
    render_template_response(
        LoginTemplate {
            view: LayoutContext::new(current.viewer_view(), LoginFormView::default()),
        },
        StatusCode::OK,
    )
}

pub(crate) async fn login(
    State(state): State<HttpState>,
    current: CurrentUser,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.accounts.login(&form.username, &form.password).await {
        Ok((_, issued)) => {
            let cookie = Cookie::build((SESSION_COOKIE, issued.token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .expires(issued.expires_at)
                .build();
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Err(err @ AccountError::Repo(_)) => {
            repo_failure_response("infra::http::accounts::login", current.viewer_view(), &err)
        }
        Err(err) => {
            let content = LoginFormView {
                username: form.username,
                errors: vec![account_error_message(&err)],
            };
            render_template_response(
                LoginTemplate {
                    view: LayoutContext::new(current.viewer_view(), content),
                },
                StatusCode::OK,
            )
        }
    }
}

/// Ends the session and renders a logged-out confirmation page.
pub(crate) async fn logout(
    State(state): State<HttpState>,
    current: CurrentUser,
    jar: CookieJar,
) -> Response {
    let Some(token) = current.session_token().map(str::to_string) else {
        return redirect_to_login();
    };

    if let Err(err) = state.accounts.logout(&token).await {
        return repo_failure_response(
            "infra::http::accounts::logout",
            current.viewer_view(),
            &err,
        );
    }

    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    let jar = jar.remove(removal);
    let page = render_template_response(
        LoggedOutTemplate {
            view: LayoutContext::new(ViewerView::anonymous(), EmptyView),
        },
        StatusCode::OK,
    );
    (jar, page).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RegistrationForm {
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
}

pub(crate) async fn registration_form(current: CurrentUser) -> Response {
    render_template_response(
        RegistrationTemplate {
            view: LayoutContext::new(current.viewer_view(), RegistrationFormView::default()),
        },
        StatusCode::OK,
    )
}

pub(crate) async fn register(
    State(state): State<HttpState>,
    current: CurrentUser,
    Form(form): Form<RegistrationForm>,
) -> Response {
    let command = RegisterCommand {
        username: form.username.clone(),
        password: form.password,
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        email: form.email.clone(),
    };

    match state.accounts.register(command).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err @ AccountError::Repo(_)) => repo_failure_response(
            "infra::http::accounts::register",
            current.viewer_view(),
            &err,
        ),
        Err(err) => {
            let content = RegistrationFormView {
                username: form.username,
                first_name: form.first_name,
                last_name: form.last_name,
                email: form.email,
                errors: vec![account_error_message(&err)],
            };
            render_template_response(
                RegistrationTemplate {
                    view: LayoutContext::new(current.viewer_view(), content),
                },
                StatusCode::OK,
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ProfileForm {
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    csrf_token: String,
}

pub(crate) async fn profile_form(current: CurrentUser) -> Response {
    let Some(user) = current.user() else {
        return redirect_to_login();
    };

    let content = ProfileFormView {
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
        errors: Vec::new(),
        csrf_token: current.csrf_token().unwrap_or_default(),
    };
    render_template_response(
        ProfileFormTemplate {
            view: LayoutContext::new(current.viewer_view(), content),
        },
        StatusCode::OK,
    )
}

pub(crate) async fn update_profile(
    State(state): State<HttpState>,
    current: CurrentUser,
    Form(form): Form<ProfileForm>,
) -> Response {
    let Some(user) = current.user().cloned() else {
        return redirect_to_login();
    };
    if !current.verify_csrf(&form.csrf_token) {
        return render_csrf_failure_response(current.viewer_view());
    }

    let command = UpdateProfileCommand {
        username: form.username.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        email: form.email.clone(),
    };

    match state.accounts.update_profile(user.id, command).await {
        Ok(updated) => {
            Redirect::to(&format!("/profile/{}/", updated.username)).into_response()
        }
        Err(err @ AccountError::Repo(_)) => repo_failure_response(
            "infra::http::accounts::update_profile",
            current.viewer_view(),
            &err,
        ),
        Err(err) => {
            let content = ProfileFormView {
                username: form.username,
                first_name: form.first_name,
                last_name: form.last_name,
                email: form.email,
                errors: vec![account_error_message(&err)],
                csrf_token: current.csrf_token().unwrap_or_default(),
            };
            render_template_response(
                ProfileFormTemplate {
                    view: LayoutContext::new(current.viewer_view(), content),
                },
                StatusCode::OK,
            )
        }
    }
}
