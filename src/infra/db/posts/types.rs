use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{AuthorRecord, PostRecord, PostWithAuthorRecord};

pub(crate) const POST_COLUMNS: &str =
    "p.id, p.title, p.content, p.published, p.author_id, p.created_at, p.updated_at";

pub(crate) const AUTHOR_COLUMNS: &str =
    "u.name AS author_name, u.username AS author_username, u.email AS author_email";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) published: bool,
    pub(crate) author_id: Uuid,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            published: row.published,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PostWithAuthorRow {
    #[sqlx(flatten)]
    pub(crate) post: PostRow,
    pub(crate) author_name: String,
    pub(crate) author_username: String,
    pub(crate) author_email: String,
}

impl From<PostWithAuthorRow> for PostWithAuthorRecord {
    fn from(row: PostWithAuthorRow) -> Self {
        let author = AuthorRecord {
            id: row.post.author_id,
            name: row.author_name,
            username: row.author_username,
            email: row.author_email,
        };
        Self {
            post: PostRecord::from(row.post),
            author,
        }
    }
}
