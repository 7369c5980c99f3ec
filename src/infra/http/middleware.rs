use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::{HttpState, SESSION_COOKIE, Viewer};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Username of the viewer, copied onto the response for request logging.
#[derive(Clone)]
struct ViewerName(String);

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Resolve the session cookie to a [`Viewer`]. A lookup failure degrades
/// to an anonymous viewer rather than failing the request.
pub async fn load_viewer(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let user = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match state.auth.resolve(cookie.value()).await {
            Ok(user) => user,
            Err(err) => {
                warn!(
                    target = "murmur::http::session",
                    error = %err,
                    "failed to resolve session cookie"
                );
                None
            }
        },
        None => None,
    };

    let username = user.as_ref().map(|user| user.username.clone());
    request
        .extensions_mut()
        .insert(Viewer(user.map(Arc::new)));

    let mut response = next.run(request).await;
    if let Some(username) = username {
        response.extensions_mut().insert(ViewerName(username));
    }
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let user = response
            .extensions()
            .get::<ViewerName>()
            .map(|name| name.0.clone())
            .unwrap_or_default();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "murmur::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user = user,
                "request failed",
            );
        } else {
            warn!(
                target = "murmur::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user = user,
                "client request error",
            );
        }
    }

    response
}
