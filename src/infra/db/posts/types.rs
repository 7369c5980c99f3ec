use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{GroupRef, PostRecord, PostSummary};

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) text: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) author_id: Uuid,
    pub(crate) group_id: Option<Uuid>,
    pub(crate) image: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            author_id: row.author_id,
            group_id: row.group_id,
            image: row.image,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PostSummaryRow {
    pub(crate) id: Uuid,
    pub(crate) text: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) author_id: Uuid,
    pub(crate) image: Option<String>,
    pub(crate) author_username: String,
    pub(crate) group_id: Option<Uuid>,
    pub(crate) group_slug: Option<String>,
    pub(crate) group_title: Option<String>,
}

impl From<PostSummaryRow> for PostSummary {
    fn from(row: PostSummaryRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };
        Self {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            author_id: row.author_id,
            author_username: row.author_username,
            group,
            image: row.image,
        }
    }
}
