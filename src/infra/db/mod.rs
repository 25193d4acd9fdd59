//! Postgres-backed repository implementations.

mod posts;
mod sessions;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{HealthRepo, PostListScope, PostQueryFilter, RepoError};

/// Joined source shared by every post listing query.
const POSTS_WITH_AUTHOR_FROM: &str = " FROM posts p INNER JOIN users u ON u.id = p.author_id WHERE 1=1 ";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn apply_scope_conditions(qb: &mut QueryBuilder<'_, Postgres>, scope: PostListScope) {
        match scope {
            PostListScope::Published => {
                qb.push(" AND p.published = TRUE ");
            }
            PostListScope::DraftsOf(author_id) => {
                qb.push(" AND p.published = FALSE AND p.author_id = ");
                qb.push_bind(author_id);
            }
        }
    }

    fn apply_post_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostQueryFilter) {
        if let Some(username) = filter.username.as_ref() {
            qb.push(" AND u.username = ");
            qb.push_bind(username.clone());
        }

        if let Some(search) = filter.search.as_ref() {
            qb.push(" AND (to_tsvector('simple', p.title) @@ websearch_to_tsquery('simple', ");
            qb.push_bind(search.clone());
            qb.push(") OR to_tsvector('simple', u.name) @@ websearch_to_tsquery('simple', ");
            qb.push_bind(search.clone());
            qb.push("))");
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
