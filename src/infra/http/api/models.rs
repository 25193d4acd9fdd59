//! Conversions from domain records to the shared wire types.

use postboard_api_types::{
    Author, PaginatedResponse, Pagination, Post, PostWithAuthor, RegisterRequest, User,
};

use crate::application::accounts::RegisterInput;
use crate::application::pagination::{Page, PageMeta};
use crate::application::session::Viewer;
use crate::domain::entities::{AuthorRecord, PostRecord, PostWithAuthorRecord, UserRecord};

pub fn pagination_to_api(meta: PageMeta) -> Pagination {
    Pagination {
        total: meta.total,
        pages_count: meta.pages_count,
        current_page: meta.current_page,
        per_page: meta.per_page,
        from: meta.from,
        to: meta.to,
        has_more: meta.has_more,
    }
}

pub fn post_to_api(post: PostRecord) -> Post {
    Post {
        id: post.id,
        title: post.title,
        content: post.content,
        published: post.published,
        author_id: post.author_id,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

pub fn author_to_api(author: AuthorRecord) -> Author {
    Author {
        id: author.id,
        name: author.name,
        username: author.username,
        email: author.email,
    }
}

pub fn listing_to_api(page: Page<PostWithAuthorRecord>) -> PaginatedResponse<PostWithAuthor> {
    PaginatedResponse {
        pagination: pagination_to_api(page.meta),
        items: page
            .items
            .into_iter()
            .map(|record| PostWithAuthor {
                post: post_to_api(record.post),
                author: author_to_api(record.author),
            })
            .collect(),
    }
}

pub fn user_to_api(user: &UserRecord) -> User {
    User {
        id: user.id,
        name: user.name.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        created_at: user.created_at,
    }
}

pub fn viewer_to_api(viewer: &Viewer) -> User {
    User {
        id: viewer.user_id,
        name: viewer.name.clone(),
        username: viewer.username.clone(),
        email: viewer.email.clone(),
        created_at: viewer.created_at,
    }
}

impl From<RegisterRequest> for RegisterInput {
    fn from(request: RegisterRequest) -> Self {
        Self {
            name: request.name,
            username: request.username,
            email: request.email,
            password: request.password,
            confirm_password: request.confirm_password,
        }
    }
}
