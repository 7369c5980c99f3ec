use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::forms::CommentCommand;
use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::{CommentRecord, UserRecord};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("post not found")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    /// Fails only when the post does not exist.
    pub async fn ensure_post(&self, post_id: Uuid) -> Result<(), CommentError> {
        self.posts
            .find_post(post_id)
            .await?
            .map(|_| ())
            .ok_or(CommentError::UnknownPost)
    }

    pub async fn add(
        &self,
        post_id: Uuid,
        author: &UserRecord,
        command: CommentCommand,
    ) -> Result<CommentRecord, CommentError> {
        self.ensure_post(post_id).await?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: author.id,
                text: command.text,
            })
            .await
            .map_err(|err| match err {
                RepoError::InvalidInput { .. } => CommentError::UnknownPost,
                other => CommentError::Repo(other),
            })?;

        info!(
            target = "murmur::comments",
            post_id = %post_id,
            comment_id = %comment.id,
            author = %author.username,
            "comment added"
        );
        Ok(comment)
    }
}
