//! Paginated, searchable post listings for the feed, author pages and drafts.
//!
//! The same validated request drives both the count and the fetch so the
//! totals describe the rows that were returned. The two reads are not wrapped
//! in a transaction.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::application::pagination::{DEFAULT_PAGE, Page, PageMeta, PageRequest};
use crate::application::repos::{PostListScope, PostQueryFilter, PostsRepo, RepoError};
use crate::config::ListingSettings;
use crate::domain::entities::PostWithAuthorRecord;
use crate::domain::users::is_valid_username;

pub const SEARCH_TERM_MAX_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Raw listing parameters as they arrive in a query string.
///
/// Values stay strings so malformed numbers reach validation instead of being
/// rejected by the extractor.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ListingQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search_term: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLimits {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl From<&ListingSettings> for ListingLimits {
    fn from(settings: &ListingSettings) -> Self {
        Self {
            default_per_page: u64::from(settings.default_per_page.get()),
            max_per_page: u64::from(settings.max_per_page.get()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub page: PageRequest,
    pub filter: PostQueryFilter,
}

#[derive(Clone)]
pub struct ListingService {
    posts: Arc<dyn PostsRepo>,
    limits: ListingLimits,
}

impl ListingService {
    pub fn new(posts: Arc<dyn PostsRepo>, limits: ListingLimits) -> Self {
        Self { posts, limits }
    }

    /// Published posts, optionally narrowed to one author.
    ///
    /// Returns `Ok(None)` when the query fails validation.
    pub async fn list_published(
        &self,
        query: &ListingQuery,
    ) -> Result<Option<Page<PostWithAuthorRecord>>, ListingError> {
        let Some(request) = self.parse(query) else {
            return Ok(None);
        };
        self.list(PostListScope::Published, request).await.map(Some)
    }

    /// Unpublished posts owned by `author_id`.
    pub async fn list_drafts(
        &self,
        author_id: Uuid,
        query: &ListingQuery,
    ) -> Result<Option<Page<PostWithAuthorRecord>>, ListingError> {
        let Some(mut request) = self.parse(query) else {
            return Ok(None);
        };
        request.filter.username = None;
        self.list(PostListScope::DraftsOf(author_id), request)
            .await
            .map(Some)
    }

    async fn list(
        &self,
        scope: PostListScope,
        request: ListingRequest,
    ) -> Result<Page<PostWithAuthorRecord>, ListingError> {
        let total = self.posts.count_posts(scope, &request.filter).await?;
        let window = request.page.window();
        let items = if window.skip >= total {
            Vec::new()
        } else {
            self.posts
                .list_posts(scope, &request.filter, window)
                .await?
        };

        debug!(
            target = "postboard::listing",
            ?scope,
            total,
            page = request.page.page(),
            per_page = request.page.per_page(),
            returned = items.len(),
            "listed posts"
        );

        Ok(Page::new(items, PageMeta::compute(total, request.page)))
    }

    /// Validate a raw query against the configured limits.
    pub fn parse(&self, query: &ListingQuery) -> Option<ListingRequest> {
        let page = match parse_positive(query.page.as_deref()) {
            Ok(value) => value.unwrap_or(DEFAULT_PAGE),
            Err(reason) => return reject("page", reason),
        };

        let per_page = match parse_positive(query.limit.as_deref()) {
            Ok(value) => value.unwrap_or(self.limits.default_per_page),
            Err(reason) => return reject("limit", reason),
        };
        if per_page > self.limits.max_per_page {
            return reject("limit", "exceeds maximum page size");
        }

        let search = non_empty(query.search_term.as_deref());
        if search
            .as_ref()
            .is_some_and(|term| term.chars().count() > SEARCH_TERM_MAX_CHARS)
        {
            return reject("searchTerm", "too long");
        }

        let username = non_empty(query.username.as_deref()).map(|name| name.to_ascii_lowercase());
        if username
            .as_deref()
            .is_some_and(|name| !is_valid_username(name))
        {
            return reject("username", "not a valid username");
        }

        Some(ListingRequest {
            page: PageRequest::new(page, per_page)?,
            filter: PostQueryFilter { search, username },
        })
    }
}

fn reject(field: &'static str, reason: &'static str) -> Option<ListingRequest> {
    debug!(
        target = "postboard::listing",
        field, reason, "rejected listing query"
    );
    None
}

fn parse_positive(raw: Option<&str>) -> Result<Option<u64>, &'static str> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err("must be at least 1"),
        Ok(value) => Ok(Some(value)),
        Err(_) => Err("not a positive integer"),
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
