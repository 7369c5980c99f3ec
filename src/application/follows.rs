//! Follow edges between readers and authors.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("no author named `{0}`")]
    UnknownAuthor(String),
    #[error("`{follower}` does not follow `{author}`")]
    NotFollowing { follower: String, author: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Users cannot follow themselves; the request is a no-op.
    SelfFollow,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(
        &self,
        follower: &UserRecord,
        username: &str,
    ) -> Result<(UserRecord, FollowOutcome), FollowError> {
        let author = self.author(username).await?;

        if author.id == follower.id {
            debug!(target = "murmur::follows", user = %follower.username, "ignored self-follow");
            return Ok((author, FollowOutcome::SelfFollow));
        }

        let outcome = if self.follows.create_follow(follower.id, author.id).await? {
            info!(
                target = "murmur::follows",
                follower = %follower.username,
                author = %author.username,
                "follow created"
            );
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        };

        Ok((author, outcome))
    }

    /// Remove the edge. A missing edge is an error the caller reports as 404.
    pub async fn unfollow(
        &self,
        follower: &UserRecord,
        username: &str,
    ) -> Result<UserRecord, FollowError> {
        let author = self.author(username).await?;

        if !self.follows.delete_follow(follower.id, author.id).await? {
            return Err(FollowError::NotFollowing {
                follower: follower.username.clone(),
                author: author.username,
            });
        }

        info!(
            target = "murmur::follows",
            follower = %follower.username,
            author = %author.username,
            "follow removed"
        );
        Ok(author)
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
