use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::{
    application::{
        auth::AuthError,
        error::HttpError,
        forms::{FormErrors, LoginForm, SignupForm},
    },
    domain::entities::UserRecord,
    presentation::views::{
        LayoutChrome, LayoutContext, LoginTemplate, LoginView, SignupTemplate, SignupView,
        render_template_response,
    },
};

use super::{
    HttpState, SESSION_COOKIE, Viewer, found,
    session::{safe_next, session_cookie, session_cookie_removal},
};

const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

pub(super) async fn signup_form(viewer: Viewer) -> Response {
    render_signup(&viewer, String::new(), FormErrors::new())
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let username = form.username.trim().to_string();
    let command = match form.validate() {
        Ok(command) => command,
        Err(errors) => return render_signup(&viewer, username, errors),
    };

    let user = match state.auth.register(command).await {
        Ok(user) => user,
        Err(AuthError::DuplicateUsername(_)) => {
            let mut errors = FormErrors::new();
            errors.add("username", DUPLICATE_USERNAME);
            return render_signup(&viewer, username, errors);
        }
        Err(AuthError::Invalid(err)) => {
            return render_signup(&viewer, username, FormErrors::from(err));
        }
        Err(err) => return HttpError::from(err).into_response(),
    };

    sign_in(&state, jar, &user, "/").await
}

pub(super) async fn login_form(viewer: Viewer, Query(query): Query<NextQuery>) -> Response {
    let view = LoginView {
        username: String::new(),
        next: query.next,
        errors: FormErrors::new(),
    };
    render_login(&viewer, view)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if let Err(errors) = form.validate() {
        let view = LoginView {
            username: form.username,
            next: form.next,
            errors,
        };
        return render_login(&viewer, view);
    }

    match state.auth.authenticate(&form.username, &form.password).await {
        Ok(user) => {
            let target = safe_next(form.next.as_deref()).unwrap_or("/");
            sign_in(&state, jar, &user, target).await
        }
        Err(AuthError::InvalidCredentials) => {
            let mut errors = FormErrors::new();
            errors.add(FormErrors::NON_FIELD, INVALID_LOGIN);
            let view = LoginView {
                username: form.username,
                next: form.next,
                errors,
            };
            render_login(&viewer, view)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Err(err) = state.auth.end_session(cookie.value()).await {
            return HttpError::from(err).into_response();
        }
    }
    (jar.remove(session_cookie_removal()), found("/")).into_response()
}

async fn sign_in(state: &HttpState, jar: CookieJar, user: &UserRecord, target: &str) -> Response {
    match state.auth.start_session(user).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(&session, state.cookie_secure));
            (jar, found(target)).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn render_signup(viewer: &Viewer, username: String, errors: FormErrors) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user()).with_title("Sign up");
    let view = LayoutContext::new(chrome, SignupView { username, errors });
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

fn render_login(viewer: &Viewer, content: LoginView) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user()).with_title("Log in");
    let view = LayoutContext::new(chrome, content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}
