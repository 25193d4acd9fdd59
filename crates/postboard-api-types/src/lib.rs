//! Wire types shared by the Postboard server and its HTTP client.
//!
//! Field names follow the camelCase JSON shape served by `/api/posts`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Page metadata attached to every paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub pages_count: u64,
    pub current_page: u64,
    pub per_page: u64,
    /// 1-indexed position of the first item on this page, `0` when the page is empty.
    pub from: u64,
    /// 1-indexed position of the last item on this page, `0` when the page is empty.
    pub to: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PaginatedResponse<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub author_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub author: Author,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEnvelope {
    pub post: Post,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

/// Query string accepted by `GET /api/posts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsQueryParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn pagination_serializes_camel_case() {
        let pagination = Pagination {
            total: 23,
            pages_count: 3,
            current_page: 1,
            per_page: 10,
            from: 1,
            to: 10,
            has_more: true,
        };

        let value = serde_json::to_value(pagination).expect("serialize");
        assert_eq!(value["pagesCount"], 3);
        assert_eq!(value["currentPage"], 1);
        assert_eq!(value["perPage"], 10);
        assert_eq!(value["hasMore"], true);
    }

    #[test]
    fn post_with_author_flattens_post_fields() {
        let author_id = Uuid::new_v4();
        let item = PostWithAuthor {
            post: Post {
                id: Uuid::new_v4(),
                title: "Hello".into(),
                content: "World".into(),
                published: true,
                author_id,
                created_at: datetime!(2024-01-02 03:04:05 UTC),
                updated_at: datetime!(2024-01-02 03:04:05 UTC),
            },
            author: Author {
                id: author_id,
                name: "Ada".into(),
                username: "ada".into(),
                email: "ada@example.com".into(),
            },
        };

        let value = serde_json::to_value(&item).expect("serialize");
        assert_eq!(value["title"], "Hello");
        assert_eq!(value["authorId"], author_id.to_string());
        assert_eq!(value["updatedAt"], "2024-01-02T03:04:05Z");
        assert_eq!(value["author"]["username"], "ada");
    }

    #[test]
    fn empty_query_params_serialize_to_nothing() {
        let params = PostsQueryParams::default();
        let value = serde_json::to_value(&params).expect("serialize");
        assert_eq!(value, serde_json::json!({}));

        let params = PostsQueryParams {
            page: Some(2),
            search_term: Some("rust".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&params).expect("serialize");
        assert_eq!(value, serde_json::json!({"page": 2, "searchTerm": "rust"}));
    }
}
