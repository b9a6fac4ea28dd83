//! Session-cookie resolution for request handlers.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::application::accounts;
use crate::application::error::ErrorReport;
use crate::domain::entities::UserRecord;
use crate::domain::visibility::Viewer;
use crate::presentation::views::{ViewerView, render_server_error_response};

use super::HttpState;

pub const SESSION_COOKIE: &str = "chronica_session";

/// The resolved identity of a request. Expired or unknown tokens resolve
/// to anonymous rather than failing the request.
#[derive(Clone)]
pub struct CurrentUser {
    user: Option<UserRecord>,
    token: Option<String>,
}

impl CurrentUser {
    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub fn viewer(&self) -> Viewer {
        match &self.user {
            Some(user) => Viewer::User(user.id),
            None => Viewer::Anonymous,
        }
    }

    pub fn viewer_view(&self) -> ViewerView {
        match &self.user {
            Some(user) => ViewerView::named(user.username.clone()),
            None => ViewerView::anonymous(),
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Anti-forgery token for forms rendered to this user.
    pub fn csrf_token(&self) -> Option<String> {
        self.token.as_deref().map(accounts::csrf_token)
    }

    /// True only for an authenticated session whose token matches.
    pub fn verify_csrf(&self, submitted: &str) -> bool {
        match self.csrf_token() {
            Some(expected) => expected == submitted,
            None => false,
        }
    }
}

/// Where unauthenticated access to a protected route lands.
pub fn redirect_to_login() -> Response {
    Redirect::to("/auth/login/").into_response()
}

impl FromRequestParts<HttpState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .unwrap_or_default();

        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Ok(Self {
                user: None,
                token: None,
            });
        };

        match state.accounts.authenticate(&token).await {
            Ok(user) => Ok(Self {
                user,
                token: Some(token),
            }),
            Err(err) => {
                let report = ErrorReport::from_error(
                    "infra::http::auth::current_user",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &err,
                );
                Err(render_server_error_response(ViewerView::anonymous(), report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_verification_is_bound_to_the_session_token() {
        let current = CurrentUser {
            user: None,
            token: Some("session-token".to_string()),
        };
        let token = current.csrf_token().expect("session carries a token");

        assert!(current.verify_csrf(&token));
        assert!(!current.verify_csrf("forged"));

        let anonymous = CurrentUser {
            user: None,
            token: None,
        };
        assert!(!anonymous.verify_csrf(&token));
    }
}
