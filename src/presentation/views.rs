//! Askama templates, their view structs and the shared render helpers.

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::PageSlice;
use crate::domain::entities::{CommentWithAuthor, PostWithMeta};
use crate::domain::visibility::Viewer;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// The rendered 404 page; also used for resources the viewer may not see.
pub fn render_not_found_response(viewer: ViewerView) -> Response {
    let view = LayoutContext::new(viewer, EmptyView);
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The rendered 403 page for authenticated form posts with a bad token.
pub fn render_csrf_failure_response(viewer: ViewerView) -> Response {
    let view = LayoutContext::new(viewer, EmptyView);
    let mut response =
        render_template_response(CsrfFailureTemplate { view }, StatusCode::FORBIDDEN);
    ErrorReport::from_message(
        "presentation::views::render_csrf_failure_response",
        StatusCode::FORBIDDEN,
        "Anti-forgery token mismatch",
    )
    .attach(&mut response);
    response
}

/// The rendered 500 page. The diagnostic chain goes into the report, not
/// the body.
pub fn render_server_error_response(viewer: ViewerView, report: ErrorReport) -> Response {
    let view = LayoutContext::new(viewer, EmptyView);
    let mut response = render_template_response(
        ServerErrorTemplate { view },
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    report.attach(&mut response);
    response
}

/// Navbar state: who is looking at the page.
#[derive(Debug, Clone, Default)]
pub struct ViewerView {
    pub username: Option<String>,
}

impl ViewerView {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub viewer: ViewerView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(viewer: ViewerView, content: T) -> Self {
        Self { viewer, content }
    }
}

/// Content for pages that are all chrome (error and logged-out pages).
#[derive(Clone, Copy)]
pub struct EmptyView;

#[derive(Clone)]
pub struct CategoryLink {
    pub title: String,
    pub slug: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: String,
    pub title: String,
    pub text: String,
    pub author_username: String,
    pub pub_date: String,
    pub category: Option<CategoryLink>,
    pub location_name: Option<String>,
    pub image_url: Option<String>,
    pub comment_count: i64,
    pub is_published: bool,
}

pub fn post_card(post: &PostWithMeta) -> PostCard {
    PostCard {
        id: post.post.id.to_string(),
        title: post.post.title.clone(),
        text: post.post.text.clone(),
        author_username: post.author_username.clone(),
        pub_date: format_datetime(post.post.pub_date),
        category: post.category.as_ref().map(|c| CategoryLink {
            title: c.title.clone(),
            slug: c.slug.clone(),
        }),
        location_name: post.location_name.clone(),
        image_url: post
            .post
            .image_path
            .as_ref()
            .map(|path| format!("/media/{path}")),
        comment_count: post.comment_count,
        is_published: post.post.is_published,
    }
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page: u32,
    pub next_page: u32,
}

#[derive(Clone)]
pub struct PostListView {
    pub cards: Vec<PostCard>,
    pub paginator: PaginatorView,
}

pub fn post_list_view(slice: &PageSlice<PostWithMeta>) -> PostListView {
    PostListView {
        cards: slice.items.iter().map(post_card).collect(),
        paginator: PaginatorView {
            number: slice.number,
            total_pages: slice.total_pages(),
            has_previous: slice.has_previous(),
            has_next: slice.has_next(),
            previous_page: slice.number.saturating_sub(1).max(1),
            next_page: slice.number + 1,
        },
    }
}

/// Shares the `list` field shape with the other listing pages so the
/// post-card include works across all of them.
#[derive(Clone)]
pub struct HomePageView {
    pub list: PostListView,
}

#[derive(Template)]
#[template(path = "blog/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<HomePageView>,
}

#[derive(Clone)]
pub struct CategoryPageView {
    pub title: String,
    pub description: String,
    pub list: PostListView,
}

#[derive(Template)]
#[template(path = "blog/category.html")]
pub struct CategoryTemplate {
    pub view: LayoutContext<CategoryPageView>,
}

#[derive(Clone)]
pub struct ProfilePageView {
    pub username: String,
    pub display_name: String,
    pub is_owner: bool,
    pub list: PostListView,
}

#[derive(Template)]
#[template(path = "blog/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfilePageView>,
}

#[derive(Clone)]
pub struct CommentView {
    pub id: String,
    pub author_username: String,
    pub created_at: String,
    pub text: String,
    pub can_edit: bool,
}

pub fn comment_view(comment: &CommentWithAuthor, viewer: Viewer) -> CommentView {
    CommentView {
        id: comment.comment.id.to_string(),
        author_username: comment.author_username.clone(),
        created_at: format_datetime(comment.comment.created_at),
        text: comment.comment.text.clone(),
        can_edit: viewer.is(comment.comment.author_id),
    }
}

#[derive(Clone)]
pub struct PostDetailView {
    pub card: PostCard,
    pub can_edit: bool,
    pub comments: Vec<CommentView>,
    /// Present only for authenticated viewers.
    pub comment_form: Option<CommentFormView>,
}

#[derive(Template)]
#[template(path = "blog/detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone)]
pub struct CommentFormView {
    pub action: String,
    pub text: String,
    pub errors: Vec<String>,
    pub csrf_token: String,
}

#[derive(Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Clone)]
pub struct PostFormView {
    pub heading: String,
    pub action: String,
    pub title: String,
    pub text: String,
    /// `datetime-local` value, `YYYY-MM-DDTHH:MM`.
    pub pub_date: String,
    pub categories: Vec<SelectOption>,
    pub locations: Vec<SelectOption>,
    pub is_published: bool,
    pub image_url: Option<String>,
    pub errors: Vec<String>,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "blog/create.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Clone)]
pub struct PostDeleteView {
    pub card: PostCard,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "blog/delete.html")]
pub struct PostDeleteTemplate {
    pub view: LayoutContext<PostDeleteView>,
}

#[derive(Clone)]
pub struct CommentPageView {
    pub post_id: String,
    pub form: CommentFormView,
    /// True when the page is a delete confirmation instead of an editor.
    pub deleting: bool,
}

#[derive(Template)]
#[template(path = "blog/comment.html")]
pub struct CommentPageTemplate {
    pub view: LayoutContext<CommentPageView>,
}

#[derive(Clone)]
pub struct ProfileFormView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub errors: Vec<String>,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "blog/user.html")]
pub struct ProfileFormTemplate {
    pub view: LayoutContext<ProfileFormView>,
}

#[derive(Clone, Default)]
pub struct LoginFormView {
    pub username: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "registration/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginFormView>,
}

#[derive(Template)]
#[template(path = "registration/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<EmptyView>,
}

#[derive(Clone, Default)]
pub struct RegistrationFormView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "registration/registration_form.html")]
pub struct RegistrationTemplate {
    pub view: LayoutContext<RegistrationFormView>,
}

#[derive(Template)]
#[template(path = "pages/404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<EmptyView>,
}

#[derive(Template)]
#[template(path = "pages/403csrf.html")]
pub struct CsrfFailureTemplate {
    pub view: LayoutContext<EmptyView>,
}

#[derive(Template)]
#[template(path = "pages/500.html")]
pub struct ServerErrorTemplate {
    pub view: LayoutContext<EmptyView>,
}

const DISPLAY_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

const DATETIME_LOCAL_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

pub fn format_datetime(value: OffsetDateTime) -> String {
    value
        .format(&DISPLAY_FORMAT)
        .unwrap_or_else(|_| value.to_string())
}

/// Value for `<input type="datetime-local">`.
pub fn format_datetime_local(value: OffsetDateTime) -> String {
    value
        .format(&DATETIME_LOCAL_FORMAT)
        .unwrap_or_else(|_| value.to_string())
}
