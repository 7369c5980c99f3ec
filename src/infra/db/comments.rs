use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::entities::{CommentRecord, CommentSummary};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    text: String,
    created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentSummaryRow {
    id: Uuid,
    author_username: String,
    text: String,
    created_at: OffsetDateTime,
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (id, post_id, author_id, text, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, post_id, author_id, text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.post_id)
        .bind(params.author_id)
        .bind(&params.text)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentSummary>, RepoError> {
        let rows = sqlx::query_as::<_, CommentSummaryRow>(
            r#"
            SELECT c.id, u.username AS author_username, c.text, c.created_at
            FROM comments c
            INNER JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| CommentSummary {
                id: row.id,
                author_username: row.author_username,
                text: row.text,
                created_at: row.created_at,
            })
            .collect())
    }
}
