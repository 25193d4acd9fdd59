use async_trait::async_trait;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::repos::{PostListScope, PostQueryFilter, PostsRepo, RepoError};
use crate::domain::entities::{PostRecord, PostWithAuthorRecord};
use crate::infra::db::{POSTS_WITH_AUTHOR_FROM, PostgresRepositories, map_sqlx_error};

use super::types::{AUTHOR_COLUMNS, POST_COLUMNS, PostRow, PostWithAuthorRow};

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*)");
        qb.push(POSTS_WITH_AUTHOR_FROM);
        Self::apply_scope_conditions(&mut qb, scope);
        Self::apply_post_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<Vec<PostWithAuthorRecord>, RepoError> {
        let offset = i64::try_from(window.skip)
            .map_err(|_| RepoError::from_persistence("offset exceeds supported range"))?;
        let limit = i64::try_from(window.take)
            .map_err(|_| RepoError::from_persistence("limit exceeds supported range"))?;

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(", ");
        qb.push(AUTHOR_COLUMNS);
        qb.push(POSTS_WITH_AUTHOR_FROM);
        Self::apply_scope_conditions(&mut qb, scope);
        Self::apply_post_filter(&mut qb, filter);

        qb.push(" ORDER BY p.updated_at DESC, p.id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostWithAuthorRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostWithAuthorRecord::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}
