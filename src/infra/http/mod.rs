mod accounts;
mod blog;
mod comments;
mod media;
mod middleware;
mod posts;
mod session;
mod state;

pub use session::{AuthenticatedUser, CurrentViewer, LOGIN_PATH};
pub use state::{HttpState, SiteContext};

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use uuid::Uuid;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::repos::RepoError;
use crate::domain::entities::UserRecord;
use crate::presentation::views::{LayoutChrome, render_not_found_response};

use self::middleware::{log_responses, resolve_viewer, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    let upload_limit = state.site.upload_limit_bytes;

    Router::new()
        .route("/", get(blog::index))
        .route(
            "/posts/create/",
            get(posts::create_form)
                .post(posts::create_submit)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/posts/{id}/", get(blog::post_detail))
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form)
                .post(posts::edit_submit)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/posts/{id}/delete/",
            get(posts::delete_confirm).post(posts::delete_submit),
        )
        .route("/posts/{id}/comment/", post(comments::add))
        .route(
            "/posts/{id}/edit_comment/{comment_id}/",
            get(comments::edit_form).post(comments::edit_submit),
        )
        .route(
            "/posts/{id}/delete_comment/{comment_id}/",
            get(comments::delete_confirm).post(comments::delete_submit),
        )
        .route("/category/{slug}/", get(blog::category))
        .route(
            "/profile/edit/",
            get(accounts::profile_form).post(accounts::profile_submit),
        )
        .route("/profile/{username}/", get(blog::profile))
        .route(
            LOGIN_PATH,
            get(accounts::login_form).post(accounts::login_submit),
        )
        .route("/auth/logout/", post(accounts::logout))
        .route(
            "/auth/registration/",
            get(accounts::signup_form).post(accounts::signup_submit),
        )
        .route("/media/{*path}", get(media::serve_media))
        .route("/_health/db", get(db_health))
        .fallback(fallback)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            resolve_viewer,
        ))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
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

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn fallback(State(state): State<HttpState>, CurrentViewer(viewer): CurrentViewer) -> Response {
    render_not_found_response(chrome(&state, viewer.user()))
}

fn chrome(state: &HttpState, user: Option<&UserRecord>) -> LayoutChrome {
    LayoutChrome::new(&state.site.title, user)
}

/// Path ids that are not UUIDs address nothing.
fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}
