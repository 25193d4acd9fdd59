use std::time::Duration;

use postboard_api_types::{
    CreatePostRequest, ErrorBody, LoginRequest, Post, PostEnvelope, PostsQueryParams, User,
    UserEnvelope,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::PostsPage;

pub const DEFAULT_SESSION_COOKIE: &str = "postboard_session";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Request failed with status code {status}")]
    Status {
        status: u16,
        body: Option<ErrorBody>,
    },
    #[error("failed to parse response body: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Server-provided error message, when the body carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Status {
                body: Some(body), ..
            } => Some(body.error.message.as_str()),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Status { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            ClientError::Http(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }
}

/// Exponential backoff for failed fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Signed-in user plus the session token lifted from `Set-Cookie`.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PostsClient {
    client: Client,
    base: Url,
    token: Option<String>,
    retry: RetryPolicy,
}

impl PostsClient {
    pub fn new(site: &str) -> Result<Self, ClientError> {
        let base = Url::parse(site)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            base,
            token: None,
            retry: RetryPolicy::default(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("postboard-client/", env!("CARGO_PKG_VERSION"))
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self
        }
    }

    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        Self { retry, ..self }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base.join(path).map_err(ClientError::Url)
    }

    /// `GET /api/posts`, retried per the configured [`RetryPolicy`].
    pub async fn list_posts(&self, params: &PostsQueryParams) -> Result<PostsPage, ClientError> {
        let mut attempt = 0;
        loop {
            match self.list_posts_once(params).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && attempt < self.retry.retries => {
                    let delay = self.retry.delay_for(attempt);
                    debug!(
                        target = "postboard_client::client",
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying posts request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn list_posts_once(&self, params: &PostsQueryParams) -> Result<PostsPage, ClientError> {
        let mut url = self.url("api/posts")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(page) = params.page {
                pairs.append_pair("page", &page.to_string());
            }
            if let Some(limit) = params.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if let Some(term) = params.search_term.as_deref().filter(|t| !t.trim().is_empty()) {
                pairs.append_pair("searchTerm", term);
            }
            if let Some(username) = params.username.as_deref().filter(|u| !u.trim().is_empty()) {
                pairs.append_pair("username", username);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let resp = self.request(Method::GET, url).send().await?;
        Self::handle(resp).await
    }

    pub async fn create_post(&self, request: &CreatePostRequest) -> Result<Post, ClientError> {
        let envelope: PostEnvelope = self.send_json(Method::POST, "api/posts", request).await?;
        Ok(envelope.post)
    }

    pub async fn publish_post(&self, id: Uuid) -> Result<Post, ClientError> {
        let url = self.url(&format!("api/posts/{id}/publish"))?;
        let resp = self.request(Method::POST, url).send().await?;
        let envelope: PostEnvelope = Self::handle(resp).await?;
        Ok(envelope.post)
    }

    pub async fn current_user(&self) -> Result<User, ClientError> {
        let url = self.url("api/session")?;
        let resp = self.request(Method::GET, url).send().await?;
        let envelope: UserEnvelope = Self::handle(resp).await?;
        Ok(envelope.user)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<Session, ClientError> {
        let url = self.url("api/session")?;
        let resp = self.request(Method::POST, url).json(request).send().await?;
        let token = session_token_from(&resp, DEFAULT_SESSION_COOKIE);
        let envelope: UserEnvelope = Self::handle(resp).await?;
        Ok(Session {
            user: envelope.user,
            token,
        })
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let resp = self.request(method, url).json(body).send().await?;
        Self::handle(resp).await
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn handle<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: serde_json::from_slice(&bytes).ok(),
            });
        }
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

fn session_token_from(resp: &Response, cookie_name: &str) -> Option<String> {
    let prefix = format!("{cookie_name}=");
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|raw| {
            let pair = raw.split(';').next()?.trim();
            let value = pair.strip_prefix(&prefix)?;
            (!value.is_empty()).then(|| value.to_string())
        })
}
