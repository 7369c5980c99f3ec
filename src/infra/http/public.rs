
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        listing::ListingError,
        pagination::PageNumber,
    },
    infra::uploads::UploadStorageError,
    presentation::views::{
        CommentView, IndexTemplate, LayoutChrome, LayoutContext, ListingView, PostCard,
        PostDetailView, PostTemplate, ProfileTemplate, ProfileView, post_title, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{HttpState, Viewer, db_health_response};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    pub(super) fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

pub(super) async fn index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user());

    match state.listing.index(query.number()).await {
        Ok(page) => {
            let content = ListingView::new("Latest updates", &page.items, &page.meta);
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => listing_error_to_response(err, chrome),
    }
}

pub(super) async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user());

    match state.listing.group(&slug, query.number()).await {
        Ok(listing) => {
            let content = ListingView::new(
                listing.group.title.clone(),
                &listing.page.items,
                &listing.page.meta,
            )
            .with_description(&listing.group.description)
            .with_empty_message("No posts in this group yet.");
            let view = LayoutContext::new(chrome.with_title(&listing.group.title), content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => listing_error_to_response(err, chrome),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user());

    match state
        .listing
        .profile(&username, viewer.user(), query.number())
        .await
    {
        Ok(listing) => {
            let base = profile_href(&listing.author.username);
            let content = ProfileView {
                username: listing.author.username.clone(),
                post_count: listing.post_count,
                following: listing.following,
                can_follow: viewer.user().is_some() && !listing.is_self,
                follow_action: format!("{base}follow/"),
                unfollow_action: format!("{base}unfollow/"),
                listing: ListingView::new(
                    listing.author.username.clone(),
                    &listing.page.items,
                    &listing.page.meta,
                ),
            };
            let title = format!("Profile of {}", listing.author.username);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => listing_error_to_response(err, chrome),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(post_id): Path<String>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user());
    let Some(id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome);
    };

    match state.listing.post_detail(id).await {
        Ok(detail) => {
            let is_author = viewer
                .user()
                .is_some_and(|user| user.id == detail.post.author_id);
            let card = PostCard::from_summary(&detail.post);
            let content = PostDetailView {
                edit_href: is_author.then(|| format!("{}edit/", card.detail_href)),
                comment_action: viewer
                    .user()
                    .map(|_| format!("{}comment/", card.detail_href)),
                post: card,
                author_post_count: detail.author_post_count,
                comments: detail.comments.iter().map(CommentView::from).collect(),
            };
            let view = LayoutContext::new(chrome.with_title(post_title(&detail.post)), content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Err(err) => listing_error_to_response(err, chrome),
    }
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath | UploadStorageError::Missing) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested media file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read media file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

pub(super) async fn health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

pub(super) async fn fallback(viewer: Viewer) -> Response {
    render_not_found_response(LayoutChrome::for_viewer(viewer.user()))
}

/// Unparsable ids can never match a post, so they are plain 404s.
pub(super) fn parse_post_id(raw: &str) -> Option<Uuid> {
    Uuid::try_parse(raw.trim()).ok()
}

pub(super) fn listing_error_to_response(err: ListingError, chrome: LayoutChrome) -> Response {
    match err {
        ListingError::Repo(_) => HttpError::from(err).into_response(),
        other => {
            let mut response = render_not_found_response(chrome);
            ErrorReport::from_error(
                "infra::http::listing_error_to_response",
                StatusCode::NOT_FOUND,
                &other,
            )
            .attach(&mut response);
            response
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
