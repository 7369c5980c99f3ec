//! Who is making the request, and the cookie that says so.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::application::auth::IssuedSession;
use crate::domain::entities::UserRecord;

use super::found;

pub const SESSION_COOKIE: &str = "murmur_session";

pub const LOGIN_PATH: &str = "/auth/login/";

/// The signed-in user, if any. Populated by the `load_viewer` middleware;
/// requests that never passed through it are anonymous.
#[derive(Clone, Default)]
pub struct Viewer(pub Option<Arc<UserRecord>>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// A viewer that must be signed in. Anonymous requests are sent to the
/// login page with `next` pointing back at what they asked for.
pub struct SignedIn(pub Arc<UserRecord>);

impl<S> FromRequestParts<S> for SignedIn
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Viewer>().and_then(|viewer| viewer.0.clone()) {
            Some(user) => Ok(SignedIn(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or("/");
                Err(login_redirect(next).into_response())
            }
        }
    }
}

pub fn login_redirect(next: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    found(&format!("{LOGIN_PATH}?next={encoded}"))
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim)
        .filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
}

pub fn session_cookie(session: &IssuedSession, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(session.expires_at)
        .build()
}

/// A cookie that, when removed from a jar, clears the session on the client.
pub fn session_cookie_removal() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}
