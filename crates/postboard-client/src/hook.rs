//! Paginated posts query with keep-previous-data semantics.
//!
//! A [`PostsQuery`] publishes [`QueryState`] through a `watch` channel. While a
//! new key loads, the last settled page stays visible with
//! `is_previous_data` set. After every successful load with `hasMore`, the
//! next page is fetched in the background into the shared [`QueryCache`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use postboard_api_types::PostsQueryParams;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::PostsPage;
use crate::cache::QueryCache;
use crate::client::{ClientError, PostsClient};
use crate::keys::{QueryKey, posts_key};
use crate::lock::mutex_lock;

pub const DEFAULT_QUERY_KEY: &str = "posts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub message: String,
    pub status: Option<u16>,
}

impl From<&ClientError> for QueryError {
    fn from(err: &ClientError) -> Self {
        Self {
            message: err.to_string(),
            status: err.status(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub key: Option<QueryKey>,
    pub data: Option<Arc<PostsPage>>,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_previous_data: bool,
    pub error: Option<QueryError>,
}

impl QueryState {
    pub fn has_more(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(|page| page.pagination.has_more)
    }
}

pub struct PostsQuery {
    client: Arc<PostsClient>,
    cache: Arc<QueryCache>,
    base_key: String,
    state: watch::Sender<QueryState>,
    generation: AtomicU64,
    prefetches: Mutex<Vec<JoinHandle<()>>>,
}

impl PostsQuery {
    pub fn new(client: Arc<PostsClient>, cache: Arc<QueryCache>) -> Self {
        Self::with_key(client, cache, DEFAULT_QUERY_KEY)
    }

    pub fn with_key(
        client: Arc<PostsClient>,
        cache: Arc<QueryCache>,
        base_key: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            client,
            cache,
            base_key: base_key.into(),
            state,
            generation: AtomicU64::new(0),
            prefetches: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn key_for(&self, params: &PostsQueryParams) -> QueryKey {
        posts_key(&self.base_key, params)
    }

    /// Switch to `params` and settle on its page.
    ///
    /// A fresh cache entry is served without a request. Otherwise the stale
    /// entry for the same key, or the previous key's page, is shown while the
    /// fetch runs. A response that lands after a newer call to `set_params`
    /// only fills the cache.
    pub async fn set_params(&self, params: PostsQueryParams) -> QueryState {
        let key = self.key_for(&params);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let cached = self.cache.get(&key);
        if let Some(hit) = cached.as_ref().filter(|hit| hit.fresh) {
            debug!(
                target = "postboard_client::hook",
                key = %key,
                "serving fresh cached page"
            );
            self.publish(QueryState {
                key: Some(key),
                data: Some(hit.page.clone()),
                ..QueryState::default()
            });
            self.prefetch_next(&params, &hit.page);
            return self.state();
        }

        let (placeholder, is_previous_data) = match cached {
            Some(stale) => (Some(stale.page), false),
            None => {
                let previous = self.state.borrow().data.clone();
                let is_previous = previous.is_some();
                (previous, is_previous)
            }
        };
        self.publish(QueryState {
            key: Some(key.clone()),
            is_loading: placeholder.is_none(),
            is_fetching: true,
            is_previous_data,
            data: placeholder.clone(),
            error: None,
        });

        let result = self.client.list_posts(&params).await;
        let superseded = self.generation.load(Ordering::Acquire) != generation;

        match result {
            Ok(page) => {
                let page = Arc::new(page);
                self.cache.insert(key.clone(), page.clone());
                if superseded {
                    debug!(
                        target = "postboard_client::hook",
                        key = %key,
                        "cached superseded response"
                    );
                    return self.state();
                }
                self.publish(QueryState {
                    key: Some(key),
                    data: Some(page.clone()),
                    ..QueryState::default()
                });
                self.prefetch_next(&params, &page);
            }
            Err(err) => {
                warn!(
                    target = "postboard_client::hook",
                    key = %key,
                    error = %err,
                    "posts query failed"
                );
                if superseded {
                    return self.state();
                }
                self.publish(QueryState {
                    key: Some(key),
                    data: placeholder,
                    is_previous_data,
                    error: Some(QueryError::from(&err)),
                    ..QueryState::default()
                });
            }
        }

        self.state()
    }

    /// Number of prefetch tasks that have not finished yet.
    pub fn pending_prefetches(&self) -> usize {
        let mut tasks = mutex_lock(&self.prefetches, "postboard_client::hook", "pending");
        tasks.retain(|task| !task.is_finished());
        tasks.len()
    }

    fn publish(&self, state: QueryState) {
        self.state.send_replace(state);
    }

    fn prefetch_next(&self, params: &PostsQueryParams, page: &PostsPage) {
        if !page.pagination.has_more {
            return;
        }

        let next = PostsQueryParams {
            page: Some(params.page.unwrap_or(1) + 1),
            ..params.clone()
        };
        let key = self.key_for(&next);
        if self.cache.is_fresh(&key) {
            return;
        }

        let client = self.client.clone();
        let cache = self.cache.clone();
        let task = tokio::spawn(async move {
            match client.list_posts(&next).await {
                Ok(page) => {
                    debug!(target = "postboard_client::hook", key = %key, "prefetched page");
                    cache.insert(key, Arc::new(page));
                }
                Err(err) => {
                    debug!(
                        target = "postboard_client::hook",
                        key = %key,
                        error = %err,
                        "prefetch failed"
                    );
                }
            }
        });

        let mut tasks = mutex_lock(&self.prefetches, "postboard_client::hook", "prefetch");
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }
}

impl Drop for PostsQuery {
    fn drop(&mut self) {
        let tasks = match self.prefetches.get_mut() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        };
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}
