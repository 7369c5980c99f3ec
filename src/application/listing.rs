//! Read side: paginated post listings and the post detail view.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::application::pagination::{PAGE_SIZE, Page, PageNumber, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentSummary, GroupRecord, PostSummary, UserRecord};

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("no group with slug `{0}`")]
    UnknownGroup(String),
    #[error("no author named `{0}`")]
    UnknownAuthor(String),
    #[error("post not found")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct GroupListing {
    pub group: GroupRecord,
    pub page: Page<PostSummary>,
}

pub struct ProfileListing {
    pub author: UserRecord,
    pub post_count: u64,
    /// Whether the viewer follows the author. Always false for anonymous
    /// viewers and for authors viewing their own profile.
    pub following: bool,
    pub is_self: bool,
    pub page: Page<PostSummary>,
}

pub struct PostDetail {
    pub post: PostSummary,
    pub author_post_count: u64,
    pub comments: Vec<CommentSummary>,
}

#[derive(Clone)]
pub struct ListingService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl ListingService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
        }
    }

    pub async fn index(&self, page: PageNumber) -> Result<Page<PostSummary>, ListingError> {
        self.paginate(PostFilter::All, page).await
    }

    pub async fn group(&self, slug: &str, page: PageNumber) -> Result<GroupListing, ListingError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| ListingError::UnknownGroup(slug.to_string()))?;
        let page = self.paginate(PostFilter::Group(group.id), page).await?;
        Ok(GroupListing { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        page: PageNumber,
    ) -> Result<ProfileListing, ListingError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| ListingError::UnknownAuthor(username.to_string()))?;

        let is_self = viewer.is_some_and(|viewer| viewer.id == author.id);
        let following = match viewer {
            Some(viewer) if !is_self => self.follows.is_following(viewer.id, author.id).await?,
            _ => false,
        };

        let page = self.paginate(PostFilter::Author(author.id), page).await?;
        let post_count = page.meta.total;

        Ok(ProfileListing {
            author,
            post_count,
            following,
            is_self,
            page,
        })
    }

    /// Posts by authors `user_id` follows.
    pub async fn follow_feed(
        &self,
        user_id: Uuid,
        page: PageNumber,
    ) -> Result<Page<PostSummary>, ListingError> {
        self.paginate(PostFilter::FollowedBy(user_id), page).await
    }

    pub async fn post_detail(&self, id: Uuid) -> Result<PostDetail, ListingError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or(ListingError::UnknownPost)?;
        let author_post_count = self
            .posts
            .count_posts(PostFilter::Author(post.author_id))
            .await?;
        let comments = self.comments.list_comments(post.id).await?;

        Ok(PostDetail {
            post,
            author_post_count,
            comments,
        })
    }

    async fn paginate(
        &self,
        filter: PostFilter,
        requested: PageNumber,
    ) -> Result<Page<PostSummary>, ListingError> {
        let total = self.posts.count_posts(filter).await?;
        let meta = Paginator::new(total, PAGE_SIZE).resolve(requested);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts.list_posts(filter, meta.window()).await?
        };

        debug!(
            target = "murmur::listing",
            filter = ?filter,
            page = meta.number,
            num_pages = meta.num_pages,
            rows = items.len(),
            "listing page loaded"
        );

        Ok(Page { items, meta })
    }
}
