//! Client side of the Postboard feed.
//!
//! [`PostsClient`] talks to `/api/posts`; [`PostsQuery`] layers a keyed,
//! stale-while-revalidate cache over it and prefetches the next page when the
//! server reports `hasMore`.

pub mod cache;
pub mod client;
pub mod hook;
pub mod keys;
mod lock;

pub use cache::QueryCache;
pub use client::{ClientError, PostsClient, RetryPolicy};
pub use hook::{PostsQuery, QueryError, QueryState};
pub use keys::{KeyPart, QueryKey, filter_empty_keys, posts_key};

pub use postboard_api_types::{PaginatedResponse, PostWithAuthor, PostsQueryParams};

/// The page shape shared by the client, the cache and the hook.
pub type PostsPage = PaginatedResponse<PostWithAuthor>;
