//! Request extractors for the resolved viewer and the session cookie.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{Uri, request::Parts},
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use url::form_urlencoded;

use crate::application::accounts::{IssuedSession, Viewer};
use crate::domain::entities::UserRecord;

use super::state::SiteContext;

pub const LOGIN_PATH: &str = "/auth/login/";

/// Whoever is making the request, signed in or not.
#[derive(Debug, Clone)]
pub struct CurrentViewer(pub Viewer);

impl<S> FromRequestParts<S> for CurrentViewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts.extensions.get::<Viewer>().cloned().unwrap_or_default(),
        ))
    }
}

/// A signed-in user. Anonymous requests are sent to the login page with a `next` parameter.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserRecord);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Viewer>() {
            Some(Viewer::User(user)) => Ok(Self(user.clone())),
            _ => Err(login_redirect(&parts.uri)),
        }
    }
}

pub fn login_redirect(uri: &Uri) -> Redirect {
    let next = uri
        .path_and_query()
        .map(|target| target.as_str())
        .unwrap_or("/");
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Redirect::to(&format!("{LOGIN_PATH}?next={encoded}"))
}

pub fn with_session_cookie(jar: CookieJar, site: &SiteContext, session: IssuedSession) -> CookieJar {
    let max_age = session.expires_at - time::OffsetDateTime::now_utc();
    let cookie = Cookie::build((site.cookie_name.clone(), session.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(site.secure_cookie)
        .max_age(max_age);
    jar.add(cookie)
}

pub fn without_session_cookie(jar: CookieJar, site: &SiteContext) -> CookieJar {
    jar.remove(Cookie::build((site.cookie_name.clone(), "")).path("/"))
}
