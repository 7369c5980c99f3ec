mod account;
mod follows;
mod middleware;
mod multipart;
mod posts;
mod public;
mod session;

pub use middleware::RequestContext;
pub use session::{SESSION_COOKIE, SignedIn, Viewer};

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{StatusCode, header::LOCATION},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::auth::AuthService;
use crate::application::comments::CommentService;
use crate::application::error::ErrorReport;
use crate::application::follows::FollowService;
use crate::application::listing::ListingService;
use crate::application::posts::PostService;
use crate::application::repos::{HealthRepo, RepoError};
use crate::cache::{CacheState, response_cache_layer};
use crate::infra::uploads::UploadStorage;

#[derive(Clone)]
pub struct HttpState {
    pub listing: Arc<ListingService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub auth: Arc<AuthService>,
    pub health: Arc<dyn HealthRepo>,
    pub upload_storage: Arc<UploadStorage>,
    pub cache: CacheState,
    /// Mark the session cookie `Secure`.
    pub cookie_secure: bool,
    pub upload_limit_bytes: u64,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the home page is served from the response cache.
    let cached_routes = Router::new()
        .route("/", get(public::index))
        .route_layer(from_fn_with_state(state.cache.clone(), response_cache_layer));

    let upload_body_limit = usize::try_from(state.upload_limit_bytes).unwrap_or(usize::MAX);

    let authoring_routes = Router::new()
        .route("/create/", get(posts::create_form).post(posts::create_submit))
        .route(
            "/posts/{post_id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .layer(DefaultBodyLimit::max(upload_body_limit));

    let routes = Router::new()
        .route("/group/{slug}/", get(public::group_posts))
        .route("/profile/{username}/", get(public::profile))
        .route(
            "/profile/{username}/follow/",
            get(follows::back_to_profile).post(follows::follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(follows::back_to_profile).post(follows::unfollow),
        )
        .route("/follow/", get(follows::follow_index))
        .route("/posts/{post_id}/", get(public::post_detail))
        .route(
            "/posts/{post_id}/comment/",
            get(posts::back_to_post).post(posts::add_comment),
        )
        .route(
            "/auth/signup/",
            get(account::signup_form).post(account::signup_submit),
        )
        .route(
            "/auth/login/",
            get(account::login_form).post(account::login_submit),
        )
        .route("/auth/logout/", post(account::logout))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::health))
        .merge(authoring_routes)
        .fallback(public::fallback);

    cached_routes
        .merge(routes)
        .layer(from_fn_with_state(state.clone(), middleware::load_viewer))
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
        .with_state(state)
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

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
