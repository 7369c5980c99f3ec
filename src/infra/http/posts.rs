use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Multipart;
use tracing::debug;

use crate::{
    application::{
        comments::CommentError,
        error::HttpError,
        forms::{CommentForm, FormErrors},
        posts::PostError,
    },
    domain::entities::GroupRecord,
    presentation::views::{
        LayoutChrome, LayoutContext, PostFormTemplate, PostFormView, post_href, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{HttpState, SignedIn, Viewer, found, multipart::read_post_form, public::parse_post_id};

const CREATE_PATH: &str = "/create/";

pub(super) async fn create_form(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
) -> Response {
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let chrome = LayoutChrome::for_viewer(Some(&*user)).with_title("New post");
    let content = PostFormView::new(CREATE_PATH.to_string(), &groups);
    render_post_form(chrome, content)
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    mut multipart: Multipart,
) -> Response {
    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let (text, group) = (form.text.clone(), form.group.clone());
    let command = match form.validate(&groups) {
        Ok(command) => command,
        Err(errors) => {
            let chrome = LayoutChrome::for_viewer(Some(&*user)).with_title("New post");
            let content = PostFormView::new(CREATE_PATH.to_string(), &groups);
            return rerender(chrome, content, text, &group, &groups, errors);
        }
    };

    match state.posts.create(&user, command).await {
        Ok(_) => found(&profile_href(&user.username)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path(post_id): Path<String>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&*user)).with_title("Edit post");
    let Some(id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome);
    };

    let post = match state.posts.editable(id, &user).await {
        Ok(post) => post,
        Err(err) => return post_error_to_response(err, chrome),
    };
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let content = PostFormView::for_edit(edit_action(&post_id), &groups, &post);
    render_post_form(chrome, content)
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path(post_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&*user)).with_title("Edit post");
    let Some(id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome);
    };

    let post = match state.posts.editable(id, &user).await {
        Ok(post) => post,
        Err(err) => return post_error_to_response(err, chrome),
    };
    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let (text, group) = (form.text.clone(), form.group.clone());
    let command = match form.validate(&groups) {
        Ok(command) => command,
        Err(errors) => {
            let content = PostFormView::for_edit(edit_action(&post_id), &groups, &post);
            return rerender(chrome, content, text, &group, &groups, errors);
        }
    };

    match state.posts.update(id, &user, command).await {
        Ok(updated) => found(&post_href(&updated.id.to_string())),
        Err(err) => post_error_to_response(err, chrome),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&*user));
    let Some(id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome);
    };

    let result = match form.validate() {
        Ok(command) => state.comments.add(id, &user, command).await.map(|_| ()),
        Err(_) => {
            debug!(target = "murmur::comments", post_id = %id, "ignored blank comment");
            state.comments.ensure_post(id).await
        }
    };

    match result {
        Ok(()) => found(&post_href(&id.to_string())),
        Err(CommentError::UnknownPost) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// GET on the comment action goes back to the post.
pub(super) async fn back_to_post(viewer: Viewer, Path(post_id): Path<String>) -> Response {
    match parse_post_id(&post_id) {
        Some(id) => found(&post_href(&id.to_string())),
        None => render_not_found_response(LayoutChrome::for_viewer(viewer.user())),
    }
}

fn edit_action(post_id: &str) -> String {
    format!("{}edit/", post_href(post_id))
}

fn render_post_form(chrome: LayoutChrome, content: PostFormView) -> Response {
    let view = LayoutContext::new(chrome, content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

fn rerender(
    chrome: LayoutChrome,
    content: PostFormView,
    text: String,
    group: &str,
    groups: &[GroupRecord],
    errors: FormErrors,
) -> Response {
    let content = content.with_submission(text, group, groups, errors);
    render_post_form(chrome, content)
}

/// Editing someone else's post bounces back to the post itself.
fn post_error_to_response(err: PostError, chrome: LayoutChrome) -> Response {
    match err {
        PostError::NotAuthor { post_id } => {
            debug!(target = "murmur::posts", post_id = %post_id, "edit refused for non-author");
            found(&post_href(&post_id.to_string()))
        }
        PostError::UnknownPost => render_not_found_response(chrome),
        other => HttpError::from(other).into_response(),
    }
}
