use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        follows::{FollowError, FollowOutcome},
    },
    domain::users::validate_username,
    presentation::views::{
        IndexTemplate, LayoutChrome, LayoutContext, ListingView, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{
    HttpState, SignedIn, Viewer, found,
    public::{PageQuery, listing_error_to_response},
};

/// Posts from every author the viewer follows.
pub(super) async fn follow_index(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&*user)).with_title("Following");

    match state.listing.follow_feed(user.id, query.number()).await {
        Ok(page) => {
            let heading = "Posts from authors you follow";
            let content = ListingView::new(heading, &page.items, &page.meta)
                .with_empty_message("Nothing here yet. Follow some authors to fill this feed.");
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => listing_error_to_response(err, chrome),
    }
}

pub(super) async fn follow(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok((author, outcome)) => {
            if outcome != FollowOutcome::Created {
                debug!(
                    target = "murmur::follows",
                    follower = %user.username,
                    author = %author.username,
                    outcome = ?outcome,
                    "follow left unchanged"
                );
            }
            found(&profile_href(&author.username))
        }
        Err(err) => follow_error_to_response(err, LayoutChrome::for_viewer(Some(&*user))),
    }
}

pub(super) async fn unfollow(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(author) => found(&profile_href(&author.username)),
        Err(err) => follow_error_to_response(err, LayoutChrome::for_viewer(Some(&*user))),
    }
}

/// GET on a follow or unfollow action changes nothing and goes to the
/// profile. Login redirects land here, since `next` is always fetched.
pub(super) async fn back_to_profile(viewer: Viewer, Path(username): Path<String>) -> Response {
    match validate_username(&username) {
        Ok(username) => found(&profile_href(&username)),
        Err(_) => render_not_found_response(LayoutChrome::for_viewer(viewer.user())),
    }
}

fn follow_error_to_response(err: FollowError, chrome: LayoutChrome) -> Response {
    match err {
        FollowError::Repo(_) => HttpError::from(err).into_response(),
        other => {
            let mut response = render_not_found_response(chrome);
            ErrorReport::from_error(
                "infra::http::follows::follow_error_to_response",
                StatusCode::NOT_FOUND,
                &other,
            )
            .attach(&mut response);
            response
        }
    }
}
