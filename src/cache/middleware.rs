//! Response cache middleware.
//!
//! Layered onto the routes whose output may be served stale. Only GET
//! requests are looked up, and only `200 OK` responses without `Set-Cookie`
//! are stored.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, instrument};

use crate::infra::http::SESSION_COOKIE;

use super::{CacheConfig, ResponseKey, ResponseStore, store::CachedResponse};

const MAX_CACHED_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseStore>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(ResponseStore::new(&config));
        Self { config, store }
    }

    /// Drop every stored response.
    pub fn clear(&self) {
        self.store.clear();
        debug!(cache = "page", "cache cleared");
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let jar = CookieJar::from_headers(request.headers());
    let key = ResponseKey::new(
        request.uri().path(),
        request.uri().query(),
        jar.get(SESSION_COOKIE).map(|cookie| cookie.value()),
    );

    if let Some(cached) = cache.store.get(&key) {
        debug!(cache = "page", outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    debug!(cache = "page", outcome = "miss", "cache miss, executing handler");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || response.headers().contains_key(SET_COOKIE) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };

    if let Some(evicted) = cache.store.set(key, cached) {
        debug!(cache = "page", evicted = %evicted.path, "evicted cached response");
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
