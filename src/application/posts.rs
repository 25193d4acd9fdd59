use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::PostDraft;

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("post not found")]
    NotFound,
    #[error("post belongs to another author")]
    NotAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
}

impl PostService {
    pub fn new(reader: Arc<dyn PostsRepo>, writer: Arc<dyn PostsWriteRepo>) -> Self {
        Self { reader, writer }
    }

    /// Store a new unpublished post owned by `author_id`.
    pub async fn create_draft(
        &self,
        author_id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<PostRecord, PostError> {
        let draft = PostDraft::parse(title, content)?;
        let post = self
            .writer
            .create_post(CreatePostParams {
                title: draft.title,
                content: draft.content,
                author_id,
                published: false,
            })
            .await?;

        info!(
            target = "postboard::posts",
            post_id = %post.id,
            author_id = %author_id,
            "created draft"
        );
        Ok(post)
    }

    /// Publish a draft. Publishing an already published post is a no-op.
    pub async fn publish(&self, author_id: Uuid, post_id: Uuid) -> Result<PostRecord, PostError> {
        let post = self
            .reader
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        if post.author_id != author_id {
            return Err(PostError::NotAuthor);
        }
        if post.published {
            return Ok(post);
        }

        let post = self.writer.publish_post(post_id).await.map_err(|err| match err {
            RepoError::NotFound => PostError::NotFound,
            other => PostError::Repo(other),
        })?;

        info!(
            target = "postboard::posts",
            post_id = %post.id,
            author_id = %author_id,
            "published post"
        );
        Ok(post)
    }
}
