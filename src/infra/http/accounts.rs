//! Sign-up, login, logout and profile editing.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::application::{
    error::HttpError,
    forms::{self, FormErrors, LoginForm, ProfileForm, SignupForm},
};
use crate::domain::entities::UserRecord;
use crate::presentation::views::{
    LayoutContext, LoginContext, LoginTemplate, ProfileFormContext, ProfileFormTemplate,
    SignupContext, SignupTemplate, profile_href, render_template_response,
};

use super::session::{with_session_cookie, without_session_cookie};
use super::{AuthenticatedUser, CurrentViewer, HttpState, chrome};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

pub(super) async fn login_form(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Query(query): Query<NextQuery>,
) -> Response {
    let form = LoginForm {
        next: query.next,
        ..LoginForm::default()
    };
    render_login(&state, viewer.user(), &form, FormErrors::default())
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let user = match state.accounts.login(&form).await {
        Ok(Ok(user)) => user,
        Ok(Err(errors)) => return render_login(&state, viewer.user(), &form, errors),
        Err(err) => return HttpError::from(err).into_response(),
    };

    let target = forms::safe_next(form.next.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| profile_href(&user.username));
    sign_in(&state, jar, &user, target).await
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(&state.site.cookie_name)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        return HttpError::from(err).into_response();
    }
    let jar = without_session_cookie(jar, &state.site);
    (jar, Redirect::to("/")).into_response()
}

pub(super) async fn signup_form(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
) -> Response {
    render_signup(&state, viewer.user(), SignupForm::default(), FormErrors::default())
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    match state.accounts.register(&form).await {
        Ok(Ok(user)) => {
            let target = profile_href(&user.username);
            sign_in(&state, jar, &user, target).await
        }
        Ok(Err(errors)) => render_signup(&state, viewer.user(), form, errors),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn profile_form(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Response {
    let form = ProfileForm::from_user(&user);
    render_profile_form(&state, &user, form, FormErrors::default())
}

pub(super) async fn profile_submit(
    State(state): State<HttpState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<ProfileForm>,
) -> Response {
    match state.accounts.update_profile(&user, &form).await {
        Ok(Ok(updated)) => Redirect::to(&profile_href(&updated.username)).into_response(),
        Ok(Err(errors)) => render_profile_form(&state, &user, form, errors),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn sign_in(state: &HttpState, jar: CookieJar, user: &UserRecord, target: String) -> Response {
    match state.accounts.start_session(user.id).await {
        Ok(session) => {
            let jar = with_session_cookie(jar, &state.site, session);
            (jar, Redirect::to(&target)).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn render_login(
    state: &HttpState,
    user: Option<&UserRecord>,
    form: &LoginForm,
    errors: FormErrors,
) -> Response {
    let chrome = chrome(state, user).with_title("Log in");
    let view = LayoutContext::new(chrome, LoginContext::new(form, errors));
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

fn render_signup(
    state: &HttpState,
    user: Option<&UserRecord>,
    form: SignupForm,
    errors: FormErrors,
) -> Response {
    let chrome = chrome(state, user).with_title("Sign up");
    let view = LayoutContext::new(chrome, SignupContext { form, errors });
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

fn render_profile_form(
    state: &HttpState,
    user: &UserRecord,
    form: ProfileForm,
    errors: FormErrors,
) -> Response {
    let chrome = chrome(state, Some(user)).with_title("Edit profile");
    let view = LayoutContext::new(chrome, ProfileFormContext { form, errors });
    render_template_response(ProfileFormTemplate { view }, StatusCode::OK)
}
