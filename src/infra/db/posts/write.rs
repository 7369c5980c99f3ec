use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams};
use crate::domain::entities::PostRecord;
use crate::infra::db::map_sqlx_error;

use super::PostgresRepositories;
use super::types::PostRow;

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            author_id,
            text,
            group_id,
            image,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, text, created_at, author_id, group_id, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, text, created_at, author_id, group_id, image
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(now)
        .bind(author_id)
        .bind(group_id)
        .bind(image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            text,
            group_id,
            image,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET text = $2,
                group_id = $3,
                image = COALESCE($4, image)
            WHERE id = $1
            RETURNING id, text, created_at, author_id, group_id, image
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(group_id)
        .bind(image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
