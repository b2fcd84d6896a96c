//! Post create, edit and delete pages. Non-authors are sent back to the post.

use axum::{
    Form,
    extract::{
        FromRequest, Multipart, Path, Request, State,
        multipart::MultipartError,
    },
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Redirect, Response},
};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::{
    error::HttpError,
    forms::{FormErrors, ImageUpload, PostForm},
    outcome::{Gate, Mutation},
    posts::PostError,
};
use crate::presentation::views::{
    LayoutChrome, LayoutContext, PostDeleteContext, PostDeleteTemplate, PostFormContext,
    PostFormTemplate, post_href, profile_href, render_not_found_response,
    render_template_response,
};

use super::{AuthenticatedUser, HttpState, chrome, parse_id};

const CREATE_ACTION: &str = "/posts/create/";
const IMAGE_FIELD: &str = "image";

/// The post form as browsers send it: multipart with an optional image file,
/// or urlencoded when no file input is involved.
pub(super) struct PostSubmission {
    form: PostForm,
    image: Option<ImageUpload>,
}

impl<S> FromRequest<S> for PostSubmission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<PostForm>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self { form, image: None });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let mut form = PostForm::default();
        let mut image = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == IMAGE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_rejection)?;
                // an untouched file input still sends an empty, unnamed part
                if !(file_name.is_empty() && data.is_empty()) {
                    image = Some(ImageUpload { file_name, data });
                }
                continue;
            }
            let value = field.text().await.map_err(multipart_rejection)?;
            assign_post_field(&mut form, &name, value);
        }

        Ok(Self { form, image })
    }
}

fn assign_post_field(form: &mut PostForm, name: &str, value: String) {
    match name {
        "title" => form.title = value,
        "text" => form.text = value,
        "pub_date" => form.pub_date = Some(value),
        "is_published" => form.is_published = Some(value),
        "image_clear" => form.image_clear = Some(value),
        "category" => form.category = Some(value),
        "new_category" => form.new_category = Some(value),
        "location" => form.location = Some(value),
        "new_location" => form.new_location = Some(value),
        _ => {}
    }
}

fn multipart_rejection(err: MultipartError) -> Response {
    warn!(
        target = "blogicum::posts",
        status = %err.status(),
        error = %err,
        "rejected post form payload"
    );
    (err.status(), err.body_text()).into_response()
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let form = PostForm::blank(OffsetDateTime::now_utc(), state.posts.timezone());
    render_post_form(
        &state,
        chrome,
        PostFormMode::Create,
        CREATE_ACTION.to_string(),
        form,
        FormErrors::default(),
    )
    .await
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PostSubmission { form, image }: PostSubmission,
) -> Response {
    match state.posts.create(user.id, &form, image.as_ref()).await {
        Ok(Ok(_)) => Redirect::to(&profile_href(&user.username)).into_response(),
        Ok(Err(errors)) => {
            let chrome = chrome(&state, Some(&user));
            render_post_form(
                &state,
                chrome,
                PostFormMode::Create,
                CREATE_ACTION.to_string(),
                form,
                errors,
            )
            .await
        }
        Err(err) => post_error_to_response(err, chrome(&state, Some(&user))),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some(id) = parse_id(&id) else {
        return render_not_found_response(chrome);
    };

    match state.posts.editable(id, user.id).await {
        Ok(Gate::Owner(post)) => {
            let form = PostForm::from_post(&post, state.posts.timezone());
            render_post_form(
                &state,
                chrome,
                PostFormMode::Edit,
                edit_action(id),
                form,
                FormErrors::default(),
            )
            .await
        }
        Ok(Gate::NotOwner) => Redirect::to(&post_href(id)).into_response(),
        Err(err) => post_error_to_response(err, chrome),
    }
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    PostSubmission { mut form, image }: PostSubmission,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some(id) = parse_id(&id) else {
        return render_not_found_response(chrome);
    };

    match state.posts.update(id, user.id, &form, image.as_ref()).await {
        Ok(Mutation::Applied(post)) => Redirect::to(&post_href(post.id)).into_response(),
        Ok(Mutation::NotOwner) => Redirect::to(&post_href(id)).into_response(),
        Ok(Mutation::Invalid(errors)) => {
            // the re-rendered form still shows the image the post keeps
            form.image = match state.posts.editable(id, user.id).await {
                Ok(Gate::Owner(post)) => post.image,
                Ok(Gate::NotOwner) => None,
                Err(err) => return post_error_to_response(err, chrome),
            };
            render_post_form(&state, chrome, PostFormMode::Edit, edit_action(id), form, errors)
                .await
        }
        Err(err) => post_error_to_response(err, chrome),
    }
}

pub(super) async fn delete_confirm(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some(id) = parse_id(&id) else {
        return render_not_found_response(chrome);
    };

    match state.posts.editable(id, user.id).await {
        Ok(Gate::Owner(post)) => {
            let content = PostDeleteContext::new(&post, state.posts.timezone());
            let view = LayoutContext::new(chrome.with_title("Delete post"), content);
            render_template_response(PostDeleteTemplate { view }, StatusCode::OK)
        }
        Ok(Gate::NotOwner) => Redirect::to(&post_href(id)).into_response(),
        Err(err) => post_error_to_response(err, chrome),
    }
}

pub(super) async fn delete_submit(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some(id) = parse_id(&id) else {
        return render_not_found_response(chrome);
    };

    match state.posts.delete(id, user.id).await {
        Ok(Gate::Owner(())) => Redirect::to("/").into_response(),
        Ok(Gate::NotOwner) => Redirect::to(&post_href(id)).into_response(),
        Err(err) => post_error_to_response(err, chrome),
    }
}

#[derive(Debug, Clone, Copy)]
enum PostFormMode {
    Create,
    Edit,
}

impl PostFormMode {
    fn heading(self) -> &'static str {
        match self {
            PostFormMode::Create => "New post",
            PostFormMode::Edit => "Edit post",
        }
    }

    fn submit_label(self) -> &'static str {
        match self {
            PostFormMode::Create => "Publish",
            PostFormMode::Edit => "Save",
        }
    }
}

fn edit_action(id: Uuid) -> String {
    format!("/posts/{id}/edit/")
}

async fn render_post_form(
    state: &HttpState,
    chrome: LayoutChrome,
    mode: PostFormMode,
    action: String,
    form: PostForm,
    errors: FormErrors,
) -> Response {
    let choices = match state.posts.form_choices().await {
        Ok(choices) => choices,
        Err(err) => return post_error_to_response(err, chrome),
    };

    let content = PostFormContext::new(
        mode.heading(),
        mode.submit_label(),
        action,
        form,
        errors,
        &choices,
    );
    let view = LayoutContext::new(chrome.with_title(mode.heading()), content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

fn post_error_to_response(err: PostError, chrome: LayoutChrome) -> Response {
    match err {
        PostError::NotFound => render_not_found_response(chrome),
        PostError::Repo(_) | PostError::Media(_) => HttpError::from(err).into_response(),
    }
}
