//! Post create/edit/delete handlers (author-only mutations).

use axum::{
    extract::{Form, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use time::{Date, OffsetDateTime, PrimitiveDateTime, macros::format_description};
use uuid::Uuid;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::posts::{PostInput, PostWriteError};
use crate::domain::entities::{CategoryRecord, LocationRecord, PostRecord};
use crate::presentation::views::{
    LayoutContext, PostCard, PostDeleteTemplate, PostDeleteView, PostFormTemplate, PostFormView,
    SelectOption, ViewerView, format_datetime, format_datetime_local, render_csrf_failure_response,
    render_not_found_response, render_server_error_response, render_template_response,
};

use super::auth::redirect_to_login;
use super::{CurrentUser, HttpState};

/// Raw multipart payload of the post form. `pub_date` stays a string so a
/// parse failure can re-render the form with the submitted value intact.
#[derive(Debug, Default)]
pub(crate) struct PostFormData {
    title: String,
    text: String,
    pub_date: String,
    category: Option<Uuid>,
    location: Option<Uuid>,
    is_published: bool,
    image: Option<(String, Bytes)>,
    csrf_token: String,
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostFormData, HttpError> {
    const SOURCE: &str = "infra::http::posts::read_post_form";

    let bad_payload = |detail: String| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Malformed form payload",
            detail,
        )
    };

    let mut data = PostFormData::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_payload(err.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "title" => data.title = field.text().await.map_err(|e| bad_payload(e.to_string()))?,
            "text" => data.text = field.text().await.map_err(|e| bad_payload(e.to_string()))?,
            "pub_date" => {
                data.pub_date = field.text().await.map_err(|e| bad_payload(e.to_string()))?;
            }
            "category" => {
                let value = field.text().await.map_err(|e| bad_payload(e.to_string()))?;
                data.category = value.parse().ok();
            }
            "location" => {
                let value = field.text().await.map_err(|e| bad_payload(e.to_string()))?;
                data.location = value.parse().ok();
            }
            "is_published" => {
                let value = field.text().await.map_err(|e| bad_payload(e.to_string()))?;
                data.is_published = matches!(value.as_str(), "on" | "true");
            }
            "csrf_token" => {
                data.csrf_token = field.text().await.map_err(|e| bad_payload(e.to_string()))?;
            }
            "image" => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_payload(e.to_string()))?;
                if let Some(filename) = filename.filter(|f| !f.is_empty())
                    && !bytes.is_empty()
                {
                    data.image = Some((filename, bytes));
                }
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }
    Ok(data)
}

/// Accepts the `datetime-local` widget's value, with or without seconds,
/// and a bare date as a fallback. Values are treated as UTC.
fn parse_datetime_local(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();

    let with_minutes = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    if let Ok(parsed) = PrimitiveDateTime::parse(trimmed, &with_minutes) {
        return Some(parsed.assume_utc());
    }

    let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(parsed) = PrimitiveDateTime::parse(trimmed, &with_seconds) {
        return Some(parsed.assume_utc());
    }

    let date_only = format_description!("[year]-[month]-[day]");
    if let Ok(parsed) = Date::parse(trimmed, &date_only) {
        return Some(parsed.midnight().assume_utc());
    }

    None
}

fn category_options(categories: &[CategoryRecord], selected: Option<Uuid>) -> Vec<SelectOption> {
    categories
        .iter()
        .map(|category| SelectOption {
            value: category.id.to_string(),
            label: category.title.clone(),
            selected: selected == Some(category.id),
        })
        .collect()
}

fn location_options(locations: &[LocationRecord], selected: Option<Uuid>) -> Vec<SelectOption> {
    locations
        .iter()
        .map(|location| SelectOption {
            value: location.id.to_string(),
            label: location.name.clone(),
            selected: selected == Some(location.id),
        })
        .collect()
}

struct FormPage<'a> {
    heading: &'static str,
    action: String,
    data: &'a PostFormData,
    image_url: Option<String>,
    errors: Vec<String>,
}

/// Render the post form, loading the category/location selects.
async fn render_post_form(
    state: &HttpState,
    current: &CurrentUser,
    page: FormPage<'_>,
    status: StatusCode,
) -> Response {
    let (categories, locations) = match state.posts.form_options().await {
        Ok(options) => options,
        Err(err) => {
            return post_write_error_response(
                "infra::http::posts::render_post_form",
                current.viewer_view(),
                err,
            );
        }
    };

    let content = PostFormView {
        heading: page.heading.to_string(),
        action: page.action,
        title: page.data.title.clone(),
        text: page.data.text.clone(),
        pub_date: page.data.pub_date.clone(),
        categories: category_options(&categories, page.data.category),
        locations: location_options(&locations, page.data.location),
        is_published: page.data.is_published,
        image_url: page.image_url,
        errors: page.errors,
        csrf_token: current.csrf_token().unwrap_or_default(),
    };

    render_template_response(
        PostFormTemplate {
            view: LayoutContext::new(current.viewer_view(), content),
        },
        status,
    )
}

pub(crate) fn post_write_error_response(
    source: &'static str,
    viewer: ViewerView,
    err: PostWriteError,
) -> Response {
    match err {
        PostWriteError::NotFound => render_not_found_response(viewer),
        // Denial is a silent redirect to the post's own detail page.
        PostWriteError::NotAuthor { post_id } => {
            Redirect::to(&format!("/posts/{post_id}/")).into_response()
        }
        PostWriteError::Validation { field, message } => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Invalid form input",
            format!("{field}: {message}"),
        )
        .into_response(),
        PostWriteError::Repo(repo_err) => render_server_error_response(
            viewer,
            ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, &repo_err),
        ),
    }
}

/// Store a freshly-uploaded image, if the form carried one.
async fn store_image(
    state: &HttpState,
    current: &CurrentUser,
    image: Option<(String, Bytes)>,
) -> Result<Option<String>, Response> {
    let Some((filename, bytes)) = image else {
        return Ok(None);
    };

    match state.media.store(&filename, bytes).await {
        Ok(stored) => Ok(Some(stored.stored_path)),
        Err(err) => Err(render_server_error_response(
            current.viewer_view(),
            ErrorReport::from_error(
                "infra::http::posts::store_image",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            ),
        )),
    }
}

pub(crate) async fn create_form(State(state): State<HttpState>, current: CurrentUser) -> Response {
    if current.user().is_none() {
        return redirect_to_login();
    }

    let data = PostFormData {
        pub_date: format_datetime_local(OffsetDateTime::now_utc()),
        is_published: true,
        ..PostFormData::default()
    };
    render_post_form(
        &state,
        &current,
        FormPage {
            heading: "New post",
            action: "/posts/create/".to_string(),
            data: &data,
            image_url: None,
            errors: Vec::new(),
        },
        StatusCode::OK,
    )
    .await
}

pub(crate) async fn create(
    State(state): State<HttpState>,
    current: CurrentUser,
    multipart: Multipart,
) -> Response {
    let Some(user) = current.user().cloned() else {
        return redirect_to_login();
    };

    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    if !current.verify_csrf(&form.csrf_token) {
        return render_csrf_failure_response(current.viewer_view());
    }

    let Some(pub_date) = parse_datetime_local(&form.pub_date) else {
        return render_post_form(
            &state,
            &current,
            FormPage {
                heading: "New post",
                action: "/posts/create/".to_string(),
                data: &form,
                image_url: None,
                errors: vec!["Enter a valid publication date.".to_string()],
            },
            StatusCode::OK,
        )
        .await;
    };

    let image_path = match store_image(&state, &current, form.image.clone()).await {
        Ok(path) => path,
        Err(response) => return response,
    };

    let input = PostInput {
        title: form.title.clone(),
        text: form.text.clone(),
        pub_date,
        category_id: form.category,
        location_id: form.location,
        image_path,
        is_published: form.is_published,
    };

    match state.posts.create(user.id, input).await {
        Ok(_) => Redirect::to(&format!("/profile/{}/", user.username)).into_response(),
        Err(PostWriteError::Validation { field, message }) => {
            render_post_form(
                &state,
                &current,
                FormPage {
                    heading: "New post",
                    action: "/posts/create/".to_string(),
                    data: &form,
                    image_url: None,
                    errors: vec![format!("{field}: {message}")],
                },
                StatusCode::OK,
            )
            .await
        }
        Err(err) => {
            post_write_error_response("infra::http::posts::create", current.viewer_view(), err)
        }
    }
}

fn form_data_from_record(post: &PostRecord) -> PostFormData {
    PostFormData {
        title: post.title.clone(),
        text: post.text.clone(),
        pub_date: format_datetime_local(post.pub_date),
        category: post.category_id,
        location: post.location_id,
        is_published: post.is_published,
        image: None,
        csrf_token: String::new(),
    }
}

pub(crate) async fn edit_form(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Response {
    if current.user().is_none() {
        return redirect_to_login();
    }

    let post = match state.posts.load_for_edit(id, current.viewer()).await {
        Ok(post) => post,
        Err(err) => {
            return post_write_error_response(
                "infra::http::posts::edit_form",
                current.viewer_view(),
                err,
            );
        }
    };

    let data = form_data_from_record(&post);
    let image_url = post.image_path.as_ref().map(|path| format!("/media/{path}"));
    render_post_form(
        &state,
        &current,
        FormPage {
            heading: "Edit post",
            action: format!("/posts/{id}/edit/"),
            data: &data,
            image_url,
            errors: Vec::new(),
        },
        StatusCode::OK,
    )
    .await
}

pub(crate) async fn update(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Response {
    if current.user().is_none() {
        return redirect_to_login();
    }

    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    if !current.verify_csrf(&form.csrf_token) {
        return render_csrf_failure_response(current.viewer_view());
    }

    let Some(pub_date) = parse_datetime_local(&form.pub_date) else {
        return render_post_form(
            &state,
            &current,
            FormPage {
                heading: "Edit post",
                action: format!("/posts/{id}/edit/"),
                data: &form,
                image_url: None,
                errors: vec!["Enter a valid publication date.".to_string()],
            },
            StatusCode::OK,
        )
        .await;
    };

    let image_path = match store_image(&state, &current, form.image.clone()).await {
        Ok(path) => path,
        Err(response) => return response,
    };

    let input = PostInput {
        title: form.title.clone(),
        text: form.text.clone(),
        pub_date,
        category_id: form.category,
        location_id: form.location,
        image_path,
        is_published: form.is_published,
    };

    match state.posts.update(id, current.viewer(), input).await {
        Ok(_) => Redirect::to(&format!("/posts/{id}/")).into_response(),
        Err(PostWriteError::Validation { field, message }) => {
            render_post_form(
                &state,
                &current,
                FormPage {
                    heading: "Edit post",
                    action: format!("/posts/{id}/edit/"),
                    data: &form,
                    image_url: None,
                    errors: vec![format!("{field}: {message}")],
                },
                StatusCode::OK,
            )
            .await
        }
        Err(err) => {
            post_write_error_response("infra::http::posts::update", current.viewer_view(), err)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ConfirmForm {
    csrf_token: String,
}

pub(crate) async fn delete_confirm(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Response {
    let Some(user) = current.user().cloned() else {
        return redirect_to_login();
    };

    let post = match state.posts.load_for_edit(id, current.viewer()).await {
        Ok(post) => post,
        Err(err) => {
            return post_write_error_response(
                "infra::http::posts::delete_confirm",
                current.viewer_view(),
                err,
            );
        }
    };

    // The guard above means the author is the current user.
    let card = PostCard {
        id: post.id.to_string(),
        title: post.title.clone(),
        text: post.text.clone(),
        author_username: user.username.clone(),
        pub_date: format_datetime(post.pub_date),
        category: None,
        location_name: None,
        image_url: post.image_path.as_ref().map(|path| format!("/media/{path}")),
        comment_count: 0,
        is_published: post.is_published,
    };

    let content = PostDeleteView {
        card,
        csrf_token: current.csrf_token().unwrap_or_default(),
    };
    render_template_response(
        PostDeleteTemplate {
            view: LayoutContext::new(current.viewer_view(), content),
        },
        StatusCode::OK,
    )
}

pub(crate) async fn delete(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Form(form): Form<ConfirmForm>,
) -> Response {
    let Some(user) = current.user().cloned() else {
        return redirect_to_login();
    };
    if !current.verify_csrf(&form.csrf_token) {
        return render_csrf_failure_response(current.viewer_view());
    }

    match state.posts.delete(id, current.viewer()).await {
        Ok(()) => Redirect::to(&format!("/profile/{}/", user.username)).into_response(),
        Err(err) => {
            post_write_error_response("infra::http::posts::delete", current.viewer_view(), err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_local_values_parse() {
        let parsed = parse_datetime_local("2024-03-01T09:30").expect("minutes variant");
        assert_eq!(parsed.hour(), 9);
        assert_eq!(parsed.minute(), 30);

        let parsed = parse_datetime_local("2024-03-01T09:30:15").expect("seconds variant");
        assert_eq!(parsed.second(), 15);

        let parsed = parse_datetime_local("2024-03-01").expect("date-only fallback");
        assert_eq!(parsed.hour(), 0);

        assert!(parse_datetime_local("not-a-date").is_none());
        assert!(parse_datetime_local("").is_none());
    }
}
