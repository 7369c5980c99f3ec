use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::FormErrors;
use crate::application::pagination::PageMeta;
use crate::domain::entities::{CommentSummary, GroupRecord, PostSummary, UserRecord};
use crate::domain::posts::{HUMAN_DATE_FORMAT, ISO_DATE_FORMAT, short_repr};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::OffsetDateTime;

const SITE_TITLE: &str = "Murmur";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

/// Header navigation; depends only on who is looking.
#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
    /// Signed-in username, if any. Drives the logout form.
    pub username: Option<String>,
}

impl NavigationView {
    pub fn for_viewer(viewer: Option<&UserRecord>) -> Self {
        let mut entries = vec![NavigationLinkView {
            label: "Home".to_string(),
            href: "/".to_string(),
        }];

        match viewer {
            Some(user) => {
                entries.push(NavigationLinkView {
                    label: "Following".to_string(),
                    href: "/follow/".to_string(),
                });
                entries.push(NavigationLinkView {
                    label: "New post".to_string(),
                    href: "/create/".to_string(),
                });
                entries.push(NavigationLinkView {
                    label: user.username.clone(),
                    href: profile_href(&user.username),
                });
            }
            None => {
                entries.push(NavigationLinkView {
                    label: "Log in".to_string(),
                    href: "/auth/login/".to_string(),
                });
                entries.push(NavigationLinkView {
                    label: "Sign up".to_string(),
                    href: "/auth/signup/".to_string(),
                });
            }
        }

        Self {
            entries,
            username: viewer.map(|user| user.username.clone()),
        }
    }
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub navigation: NavigationView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn for_viewer(viewer: Option<&UserRecord>) -> Self {
        Self {
            site_title: SITE_TITLE.to_string(),
            navigation: NavigationView::for_viewer(viewer),
            meta: PageMetaView {
                title: SITE_TITLE.to_string(),
            },
        }
    }

    pub fn with_title(self, title: impl AsRef<str>) -> Self {
        Self {
            meta: PageMetaView {
                title: format!("{} | {}", title.as_ref(), self.site_title),
            },
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub navigation: NavigationView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            navigation: chrome.navigation,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: String,
    pub text: String,
    pub author: String,
    pub author_href: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
    pub iso_date: String,
    pub published: String,
    pub detail_href: String,
}

impl PostCard {
    pub fn from_summary(post: &PostSummary) -> Self {
        Self {
            id: post.id.to_string(),
            text: post.text.clone(),
            author: post.author_username.clone(),
            author_href: profile_href(&post.author_username),
            group: post.group.as_ref().map(|group| GroupBadge {
                title: group.title.clone(),
                href: group_href(&group.slug),
            }),
            image_url: post.image.as_deref().map(media_href),
            iso_date: format_date(post.created_at, ISO_DATE_FORMAT),
            published: format_date(post.created_at, HUMAN_DATE_FORMAT),
            detail_href: post_href(&post.id.to_string()),
        }
    }
}

/// Previous/next links for a paginated listing.
#[derive(Clone)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub has_other_pages: bool,
}

impl From<&PageMeta> for PaginatorView {
    fn from(meta: &PageMeta) -> Self {
        Self {
            number: meta.number,
            num_pages: meta.num_pages,
            total: meta.total,
            previous_href: meta.previous_page_number().map(page_href),
            next_href: meta.next_page_number().map(page_href),
            has_other_pages: meta.has_other_pages(),
        }
    }
}

pub struct ListingView {
    pub heading: String,
    pub description: Option<String>,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub empty_message: &'static str,
}

impl ListingView {
    pub fn new(heading: impl Into<String>, posts: &[PostSummary], meta: &PageMeta) -> Self {
        Self {
            heading: heading.into(),
            description: None,
            posts: posts.iter().map(PostCard::from_summary).collect(),
            paginator: PaginatorView::from(meta),
            empty_message: "No posts yet.",
        }
    }

    pub fn with_description(self, description: &str) -> Self {
        let description = description.trim();
        Self {
            description: (!description.is_empty()).then(|| description.to_string()),
            ..self
        }
    }

    pub fn with_empty_message(self, empty_message: &'static str) -> Self {
        Self {
            empty_message,
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingView>,
}

pub struct ProfileView {
    pub username: String,
    pub post_count: u64,
    pub following: bool,
    /// Follow controls render only for signed-in viewers looking at someone else.
    pub can_follow: bool,
    pub follow_action: String,
    pub unfollow_action: String,
    pub listing: ListingView,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct CommentView {
    pub author: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentSummary> for CommentView {
    fn from(comment: &CommentSummary) -> Self {
        Self {
            author: comment.author_username.clone(),
            author_href: profile_href(&comment.author_username),
            text: comment.text.clone(),
            published: format_date(comment.created_at, HUMAN_DATE_FORMAT),
        }
    }
}

pub struct PostDetailView {
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub edit_href: Option<String>,
    /// Where the comment form posts; `None` hides the form.
    pub comment_action: Option<String>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct GroupOption {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

impl PostFormView {
    pub fn new(action: String, groups: &[GroupRecord]) -> Self {
        Self {
            is_edit: false,
            action,
            text: String::new(),
            groups: group_options(groups, ""),
            current_image: None,
            errors: FormErrors::new(),
        }
    }

    pub fn for_edit(action: String, groups: &[GroupRecord], post: &PostSummary) -> Self {
        let selected = post
            .group
            .as_ref()
            .map(|group| group.id.to_string())
            .unwrap_or_default();
        Self {
            is_edit: true,
            action,
            text: post.text.clone(),
            groups: group_options(groups, &selected),
            current_image: post.image.as_deref().map(media_href),
            errors: FormErrors::new(),
        }
    }

    /// Keep what was submitted so the user can correct it.
    pub fn with_submission(
        self,
        text: String,
        selected_group: &str,
        groups: &[GroupRecord],
        errors: FormErrors,
    ) -> Self {
        Self {
            text,
            groups: group_options(groups, selected_group.trim()),
            errors,
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct LoginView {
    pub username: String,
    pub next: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

pub struct SignupView {
    pub username: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn post_href(id: &str) -> String {
    format!("/posts/{id}/")
}

pub fn media_href(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

fn page_href(number: u64) -> String {
    format!("?page={number}")
}

fn group_options(groups: &[GroupRecord], selected: &str) -> Vec<GroupOption> {
    groups
        .iter()
        .map(|group| {
            let id = group.id.to_string();
            GroupOption {
                selected: id == selected,
                id,
                title: group.title.clone(),
            }
        })
        .collect()
}

fn format_date(value: OffsetDateTime, format: &[time::format_description::FormatItem<'_>]) -> String {
    value.format(format).unwrap_or_default()
}

/// Page title for a post: its short representation.
pub fn post_title(post: &PostSummary) -> String {
    short_repr(&post.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::{PAGE_SIZE, PageNumber, Paginator};
    use crate::domain::entities::GroupRef;
    use time::macros::datetime;
    use uuid::Uuid;

    fn summary() -> PostSummary {
        PostSummary {
            id: Uuid::nil(),
            text: "Hello from the first post".to_string(),
            created_at: datetime!(2024-03-05 14:30:00 UTC),
            author_id: Uuid::nil(),
            author_username: "leo".to_string(),
            group: Some(GroupRef {
                id: Uuid::nil(),
                slug: "cats".to_string(),
                title: "Cats".to_string(),
            }),
            image: Some("posts/abc-cat.gif".to_string()),
        }
    }

    #[test]
    fn post_card_links_author_group_and_media() {
        let card = PostCard::from_summary(&summary());
        assert_eq!(card.author_href, "/profile/leo/");
        assert_eq!(card.group.map(|g| g.href), Some("/group/cats/".to_string()));
        assert_eq!(card.image_url.as_deref(), Some("/media/posts/abc-cat.gif"));
        assert_eq!(card.published, "5 March 2024");
        assert_eq!(card.iso_date, "2024-03-05T14:30:00Z");
    }

    #[test]
    fn paginator_links_use_page_query() {
        let meta = Paginator::new(25, PAGE_SIZE).resolve(PageNumber::parse(Some("2")));
        let view = PaginatorView::from(&meta);
        assert_eq!(view.previous_href.as_deref(), Some("?page=1"));
        assert_eq!(view.next_href.as_deref(), Some("?page=3"));
        assert!(view.has_other_pages);
    }

    #[test]
    fn navigation_depends_on_viewer() {
        let anonymous = NavigationView::for_viewer(None);
        assert!(anonymous.entries.iter().any(|e| e.href == "/auth/login/"));
        assert!(anonymous.username.is_none());

        let user = UserRecord {
            id: Uuid::nil(),
            username: "leo".to_string(),
            password_hash: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let signed_in = NavigationView::for_viewer(Some(&user));
        assert!(signed_in.entries.iter().any(|e| e.href == "/create/"));
        assert_eq!(signed_in.username.as_deref(), Some("leo"));
    }

    #[test]
    fn post_title_is_short_representation() {
        assert_eq!(post_title(&summary()), "Hello from the ");
    }
}
