use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugError, derive_slug, validate_slug};

pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group title is required")]
    EmptyTitle,
    #[error("group title exceeds {MAX_TITLE_LEN} characters")]
    TitleTooLong,
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("a group with slug `{0}` already exists")]
    DuplicateSlug(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(GroupError::EmptyTitle);
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(GroupError::TitleTooLong);
        }

        let slug = match command.slug.as_deref() {
            Some(raw) => validate_slug(raw)?,
            None => derive_slug(&title)?,
        };

        let group = self
            .groups
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: command.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::DuplicateSlug(slug),
                other => GroupError::Repo(other),
            })?;

        info!(target = "murmur::groups", slug = %group.slug, "group created");
        Ok(group)
    }
}
