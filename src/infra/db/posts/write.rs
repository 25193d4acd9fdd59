use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, PostsWriteRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

use super::types::PostRow;

const RETURNING_POST: &str =
    " RETURNING id, title, content, published, author_id, created_at, updated_at";

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            title,
            content,
            author_id,
            published,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "INSERT INTO posts (id, title, content, published, author_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6){RETURNING_POST}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(title)
            .bind(content)
            .bind(published)
            .bind(author_id)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn publish_post(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        let sql = format!(
            "UPDATE posts SET published = TRUE, updated_at = $2 WHERE id = $1{RETURNING_POST}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Ok(PostRecord::from(row))
    }
}
