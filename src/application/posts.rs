//! Post authoring: create, edit and delete.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::forms::{PostCommand, ValidatedImage};
use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRecord, PostRecord, PostSummary, UserRecord};
use crate::domain::posts::short_repr;
use crate::infra::uploads::{UploadStorage, UploadStorageError};

/// Directory below the upload root that post images are written to.
pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    UnknownPost,
    #[error("only the author may edit this post")]
    NotAuthor { post_id: Uuid },
    #[error("failed to store image")]
    Storage(#[from] UploadStorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    storage: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            storage,
        }
    }

    /// Groups a post may be filed under.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create(
        &self,
        author: &UserRecord,
        command: PostCommand,
    ) -> Result<PostRecord, PostError> {
        let PostCommand {
            text,
            group_id,
            image,
        } = command;

        let image = match image {
            Some(image) => Some(self.store_image(image).await?),
            None => None,
        };

        let created = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text,
                group_id,
                image: image.clone(),
            })
            .await;

        match created {
            Ok(post) => {
                info!(
                    target = "murmur::posts",
                    post_id = %post.id,
                    author = %author.username,
                    preview = %short_repr(&post.text),
                    "post created"
                );
                Ok(post)
            }
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                Err(err.into())
            }
        }
    }

    /// Load a post for editing, refusing anyone but its author.
    pub async fn editable(&self, id: Uuid, editor: &UserRecord) -> Result<PostSummary, PostError> {
        let post = self
            .reader
            .find_post(id)
            .await?
            .ok_or(PostError::UnknownPost)?;
        if post.author_id != editor.id {
            return Err(PostError::NotAuthor { post_id: post.id });
        }
        Ok(post)
    }

    /// Apply an edit. Identity and publication date are never touched; the
    /// image is replaced only when a new one was uploaded.
    pub async fn update(
        &self,
        id: Uuid,
        editor: &UserRecord,
        command: PostCommand,
    ) -> Result<PostRecord, PostError> {
        let current = self.editable(id, editor).await?;
        let PostCommand {
            text,
            group_id,
            image,
        } = command;

        let image = match image {
            Some(image) => Some(self.store_image(image).await?),
            None => None,
        };

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id,
                text,
                group_id,
                image: image.clone(),
            })
            .await;

        match updated {
            Ok(post) => {
                if image.is_some() {
                    self.discard_image(current.image.as_deref()).await;
                }
                info!(target = "murmur::posts", post_id = %post.id, "post updated");
                Ok(post)
            }
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                Err(err.into())
            }
        }
    }

    /// Delete a post; its comments go with it.
    pub async fn delete(&self, id: Uuid) -> Result<(), PostError> {
        let post = self
            .reader
            .find_post(id)
            .await?
            .ok_or(PostError::UnknownPost)?;
        self.writer.delete_post(id).await?;
        self.discard_image(post.image.as_deref()).await;
        info!(target = "murmur::posts", post_id = %id, "post deleted");
        Ok(())
    }

    async fn store_image(&self, image: ValidatedImage) -> Result<String, PostError> {
        let stored = self
            .storage
            .store(
                POST_IMAGE_DIR,
                &image.filename,
                image.extension,
                image.bytes,
            )
            .await?;
        debug!(
            target = "murmur::posts",
            path = %stored.stored_path,
            checksum = %stored.checksum,
            size_bytes = stored.size_bytes,
            "image stored"
        );
        Ok(stored.stored_path)
    }

    async fn discard_image(&self, stored_path: Option<&str>) {
        let Some(path) = stored_path else {
            return;
        };
        if let Err(err) = self.storage.delete(path).await {
            warn!(
                target = "murmur::posts",
                path,
                error = %err,
                "failed to remove stored image"
            );
        }
    }
}
