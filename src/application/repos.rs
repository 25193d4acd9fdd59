//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::domain::entities::{PostRecord, PostWithAuthorRecord, SessionRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Base condition applied to every post listing before search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostListScope {
    /// Published posts from every author.
    Published,
    /// Unpublished posts owned by one author.
    DraftsOf(Uuid),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQueryFilter {
    /// Matches the post title or the author's display name.
    pub search: Option<String>,
    /// Restricts the listing to one author's username.
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub published: bool,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hashed_secret: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError>;

    /// Posts in `scope` matching `filter`, newest `updated_at` first.
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<Vec<PostWithAuthorRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn publish_post(&self, id: Uuid) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError>;

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError>;

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    /// Round-trip to the store without touching any table.
    async fn ping(&self) -> Result<(), RepoError>;
}
