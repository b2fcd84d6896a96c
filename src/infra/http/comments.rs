//! Comment add, edit and delete. Comments are always addressed through their post.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use uuid::Uuid;

use crate::application::{
    comments::CommentError,
    error::HttpError,
    forms::{CommentForm, FormErrors},
    outcome::{Gate, Mutation},
};
use crate::presentation::views::{
    CommentFormContext, CommentMode, CommentTemplate, LayoutChrome, LayoutContext, post_href,
    render_not_found_response, render_template_response,
};

use super::{AuthenticatedUser, HttpState, chrome, parse_id};

pub(super) async fn add(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some(post_id) = parse_id(&post_id) else {
        return render_not_found_response(chrome);
    };

    match state.comments.add(post_id, user.id, &form).await {
        Ok(_) => Redirect::to(&post_href(post_id)).into_response(),
        Err(err) => comment_error_to_response(err, chrome),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some((post_id, comment_id)) = parse_ids(&post_id, &comment_id) else {
        return render_not_found_response(chrome);
    };

    match state.comments.editable(post_id, comment_id, user.id).await {
        Ok(Gate::Owner(comment)) => render_comment_page(
            chrome,
            CommentMode::Edit,
            post_id,
            comment_id,
            comment.text,
            FormErrors::default(),
        ),
        Ok(Gate::NotOwner) => Redirect::to(&post_href(post_id)).into_response(),
        Err(err) => comment_error_to_response(err, chrome),
    }
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((post_id, comment_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some((post_id, comment_id)) = parse_ids(&post_id, &comment_id) else {
        return render_not_found_response(chrome);
    };

    match state
        .comments
        .update(post_id, comment_id, user.id, &form)
        .await
    {
        Ok(Mutation::Applied(_)) | Ok(Mutation::NotOwner) => {
            Redirect::to(&post_href(post_id)).into_response()
        }
        Ok(Mutation::Invalid(errors)) => render_comment_page(
            chrome,
            CommentMode::Edit,
            post_id,
            comment_id,
            form.text,
            errors,
        ),
        Err(err) => comment_error_to_response(err, chrome),
    }
}

pub(super) async fn delete_confirm(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some((post_id, comment_id)) = parse_ids(&post_id, &comment_id) else {
        return render_not_found_response(chrome);
    };

    match state.comments.editable(post_id, comment_id, user.id).await {
        Ok(Gate::Owner(comment)) => render_comment_page(
            chrome,
            CommentMode::Delete,
            post_id,
            comment_id,
            comment.text,
            FormErrors::default(),
        ),
        Ok(Gate::NotOwner) => Redirect::to(&post_href(post_id)).into_response(),
        Err(err) => comment_error_to_response(err, chrome),
    }
}

pub(super) async fn delete_submit(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Response {
    let chrome = chrome(&state, Some(&user));
    let Some((post_id, comment_id)) = parse_ids(&post_id, &comment_id) else {
        return render_not_found_response(chrome);
    };

    match state.comments.delete(post_id, comment_id, user.id).await {
        Ok(Gate::Owner(())) | Ok(Gate::NotOwner) => {
            Redirect::to(&post_href(post_id)).into_response()
        }
        Err(err) => comment_error_to_response(err, chrome),
    }
}

fn parse_ids(post_id: &str, comment_id: &str) -> Option<(Uuid, Uuid)> {
    Some((parse_id(post_id)?, parse_id(comment_id)?))
}

fn render_comment_page(
    chrome: LayoutChrome,
    mode: CommentMode,
    post_id: Uuid,
    comment_id: Uuid,
    text: String,
    errors: FormErrors,
) -> Response {
    let (title, action) = match mode {
        CommentMode::Edit => (
            "Edit comment",
            format!("/posts/{post_id}/edit_comment/{comment_id}/"),
        ),
        CommentMode::Delete => (
            "Delete comment",
            format!("/posts/{post_id}/delete_comment/{comment_id}/"),
        ),
    };
    let content = CommentFormContext {
        mode,
        action,
        cancel_href: post_href(post_id),
        text,
        errors,
    };
    let view = LayoutContext::new(chrome.with_title(title), content);
    render_template_response(CommentTemplate { view }, StatusCode::OK)
}

fn comment_error_to_response(err: CommentError, chrome: LayoutChrome) -> Response {
    match err {
        CommentError::PostNotFound | CommentError::NotFound => render_not_found_response(chrome),
        CommentError::Repo(_) => HttpError::from(err).into_response(),
    }
}
