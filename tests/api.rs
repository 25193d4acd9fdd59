use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use postboard::application::accounts::AccountService;
use postboard::application::listing::{ListingLimits, ListingService};
use postboard::application::pagination::PageWindow;
use postboard::application::posts::PostService;
use postboard::application::repos::{
    CreatePostParams, CreateSessionParams, CreateUserParams, HealthRepo, PostListScope,
    PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UsersRepo,
};
use postboard::application::session::SessionService;
use postboard::domain::entities::{PostRecord, PostWithAuthorRecord, SessionRecord, UserRecord};
use postboard::infra::http::{self, ApiState, AuthState, HttpState, RouterState, SessionCookie};

const COOKIE: &str = "postboard_session";

#[derive(Default)]
struct MemoryStore {
    users: Mutex<Vec<UserRecord>>,
    posts: Mutex<Vec<PostRecord>>,
    sessions: Mutex<Vec<SessionRecord>>,
    post_calls: AtomicUsize,
    reads_fail: AtomicBool,
}

impl MemoryStore {
    fn post_calls(&self) -> usize {
        self.post_calls.load(Ordering::SeqCst)
    }

    fn touch_posts(&self) {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn fail_reads(&self) {
        self.reads_fail.store(true, Ordering::SeqCst);
    }

    fn add_user(&self, name: &str, username: &str) -> UserRecord {
        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "unused".to_string(),
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    fn add_post(&self, author: &UserRecord, title: &str, published: bool, age_minutes: i64) {
        let at = OffsetDateTime::now_utc() - Duration::minutes(age_minutes);
        self.posts.lock().unwrap().push(PostRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: format!("{title} body"),
            published,
            author_id: author.id,
            created_at: at,
            updated_at: at,
        });
    }

    fn matching(&self, scope: PostListScope, filter: &PostQueryFilter) -> Vec<PostWithAuthorRecord> {
        let users = self.users.lock().unwrap();
        let mut rows: Vec<PostWithAuthorRecord> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| match scope {
                PostListScope::Published => post.published,
                PostListScope::DraftsOf(author) => !post.published && post.author_id == author,
            })
            .filter_map(|post| {
                let author = users.iter().find(|user| user.id == post.author_id)?;
                Some(PostWithAuthorRecord {
                    post: post.clone(),
                    author: author.author(),
                })
            })
            .filter(|row| {
                filter
                    .username
                    .as_deref()
                    .is_none_or(|username| row.author.username == username)
            })
            .filter(|row| {
                filter.search.as_deref().is_none_or(|term| {
                    let term = term.to_lowercase();
                    row.post.title.to_lowercase().contains(&term)
                        || row.author.name.to_lowercase().contains(&term)
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.post
                .updated_at
                .cmp(&a.post.updated_at)
                .then(b.post.id.cmp(&a.post.id))
        });
        rows
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError> {
        self.touch_posts();
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection reset by peer"));
        }
        Ok(self.matching(scope, filter).len() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<Vec<PostWithAuthorRecord>, RepoError> {
        self.touch_posts();
        Ok(self
            .matching(scope, filter)
            .into_iter()
            .skip(window.skip as usize)
            .take(window.take as usize)
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.touch_posts();
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|post| post.id == id)
            .cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.touch_posts();
        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            content: params.content,
            published: params.published,
            author_id: params.author_id,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn publish_post(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        self.touch_posts();
        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(RepoError::NotFound)?;
        post.published = true;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|user| user.email == params.email) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".into(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: params.name,
            username: params.username,
            email: params.email,
            password_hash: params.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let record = SessionRecord {
            id: params.id,
            user_id: params.user_id,
            hashed_secret: params.hashed_secret,
            expires_at: params.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        self.sessions.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|session| session.id == id)
            .cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.sessions.lock().unwrap().retain(|session| session.id != id);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|session| session.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    state: RouterState,
    router: Router,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let listing = Arc::new(ListingService::new(
            store.clone(),
            ListingLimits {
                default_per_page: 3,
                max_per_page: 100,
            },
        ));
        let posts = Arc::new(PostService::new(store.clone(), store.clone()));
        let accounts = Arc::new(AccountService::new(store.clone()));
        let sessions = Arc::new(SessionService::new(
            store.clone(),
            store.clone(),
            Duration::hours(1),
        ));
        let cookie = SessionCookie::new(COOKIE, false, Duration::hours(1));

        let state = RouterState {
            http: HttpState {
                listing: listing.clone(),
                posts: posts.clone(),
                accounts: accounts.clone(),
                sessions: sessions.clone(),
                cookie: cookie.clone(),
                health: store.clone(),
            },
            api: ApiState {
                listing,
                posts,
                accounts,
                sessions: sessions.clone(),
                cookie: cookie.clone(),
            },
            auth: AuthState { sessions, cookie },
        };
        let router = http::build_router(state.clone());

        Self {
            store,
            state,
            router,
        }
    }

    async fn sign_in(&self, user: &UserRecord) -> String {
        self.state
            .auth
            .sessions
            .issue(user)
            .await
            .expect("issue session")
            .token
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn anonymous_drafts_request_redirects_without_touching_posts() {
    let harness = Harness::new();

    let response = harness.send(get("/post/drafts?page=2")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/login?next=%2Fpost%2Fdrafts%3Fpage%3D2"
    );
    assert_eq!(harness.store.post_calls(), 0);
}

#[tokio::test]
async fn anonymous_api_write_is_forbidden_before_any_repo_call() {
    let harness = Harness::new();

    let response = harness
        .send(json_request(
            "POST",
            "/api/posts",
            None,
            json!({"title": "Hello", "content": "World"}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "forbidden");
    assert_eq!(harness.store.post_calls(), 0);
}

#[tokio::test]
async fn feed_paginates_with_exact_metadata() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    for i in 0..23 {
        harness.store.add_post(&ada, &format!("Post {i}"), true, i);
    }

    let response = harness.send(get("/api/posts?page=3&limit=10")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["items"].as_array().map(Vec::len), Some(3));
    assert_eq!(
        body["pagination"],
        json!({
            "total": 23, "pagesCount": 3, "currentPage": 3, "perPage": 10,
            "from": 21, "to": 23, "hasMore": false
        })
    );
    assert_eq!(body["items"][2]["title"], "Post 22");
}

#[tokio::test]
async fn default_page_size_is_three_newest_first() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    harness.store.add_post(&ada, "Oldest", true, 30);
    harness.store.add_post(&ada, "Newest", true, 1);
    harness.store.add_post(&ada, "Middle", true, 10);
    harness.store.add_post(&ada, "Draft", false, 0);
    harness.store.add_post(&ada, "Ancient", true, 60);

    let body = body_json(harness.send(get("/api/posts")).await).await;

    let titles: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["title"].as_str())
        .collect();
    assert_eq!(titles, ["Newest", "Middle", "Oldest"]);
    assert_eq!(body["pagination"]["total"], 4);
    assert_eq!(body["pagination"]["hasMore"], true);
}

#[tokio::test]
async fn search_matches_title_or_author_name() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada Lovelace", "ada");
    let bob = harness.store.add_user("Bob", "bob");
    harness.store.add_post(&ada, "Engines", true, 1);
    harness.store.add_post(&bob, "Learning Rust", true, 2);
    harness.store.add_post(&bob, "Gardening", true, 3);

    let body = body_json(harness.send(get("/api/posts?searchTerm=rust")).await).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["items"][0]["title"], "Learning Rust");

    let body = body_json(harness.send(get("/api/posts?searchTerm=lovelace")).await).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["items"][0]["author"]["username"], "ada");
}

#[tokio::test]
async fn invalid_listing_query_is_not_found() {
    let harness = Harness::new();

    for uri in ["/api/posts?page=0", "/api/posts?limit=abc", "/api/posts?limit=101"] {
        let response = harness.send(get(uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    let response = harness.send(get("/?page=-1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(harness.store.post_calls(), 0);
}

#[tokio::test]
async fn malformed_query_string_is_not_found() {
    let harness = Harness::new();

    let response = harness.send(get("/api/posts?page=1&page=2")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "not_found");

    let response = harness.send(get("/?page=1&page=2")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(harness.store.post_calls(), 0);
}

#[tokio::test]
async fn store_failure_is_a_json_server_error() {
    let harness = Harness::new();
    harness.store.fail_reads();

    let response = harness.send(get("/api/posts")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "repo_error");
    assert_eq!(body["error"]["message"], "Persistence error");
    assert!(!body.to_string().contains("connection reset"));
}

#[tokio::test]
async fn huge_page_number_is_an_empty_page() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    harness.store.add_post(&ada, "Only", true, 1);

    let response = harness
        .send(get("/api/posts?page=4000000000000000000"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["pagination"]["hasMore"], false);
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    harness.store.add_post(&ada, "Only", true, 1);

    let body = body_json(harness.send(get("/api/posts?page=5")).await).await;

    assert_eq!(body["items"], json!([]));
    assert_eq!(body["pagination"]["from"], 0);
    assert_eq!(body["pagination"]["to"], 0);
    assert_eq!(body["pagination"]["hasMore"], false);
}

#[tokio::test]
async fn signed_in_author_creates_a_draft_and_sees_it() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    let token = harness.sign_in(&ada).await;

    let response = harness
        .send(json_request(
            "POST",
            "/api/posts",
            Some(&token),
            json!({"title": "  First draft ", "content": "Hello"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["post"]["title"], "First draft");
    assert_eq!(body["post"]["published"], false);
    assert_eq!(body["post"]["authorId"], ada.id.to_string());

    let feed = body_json(harness.send(get("/api/posts")).await).await;
    assert_eq!(feed["pagination"]["total"], 0);

    let drafts = Request::builder()
        .uri("/post/drafts")
        .header(header::COOKIE, format!("{COOKIE}={token}"))
        .body(Body::empty())
        .unwrap();
    let response = harness.send(drafts).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("First draft"));
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    let token = harness.sign_in(&ada).await;

    let response = harness
        .send(json_request(
            "POST",
            "/api/posts",
            Some(&token),
            json!({"title": "   ", "content": "Hello"}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_the_author_can_publish() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    let bob = harness.store.add_user("Bob", "bob");
    harness.store.add_post(&ada, "Ada's draft", false, 1);
    let post_id = harness.store.posts.lock().unwrap()[0].id;

    let bob_token = harness.sign_in(&bob).await;
    let response = harness
        .send(json_request(
            "POST",
            &format!("/api/posts/{post_id}/publish"),
            Some(&bob_token),
            json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let ada_token = harness.sign_in(&ada).await;
    let response = harness
        .send(json_request(
            "POST",
            &format!("/api/posts/{post_id}/publish"),
            Some(&ada_token),
            json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["post"]["published"], true);

    let feed = body_json(harness.send(get("/api/posts")).await).await;
    assert_eq!(feed["items"][0]["title"], "Ada's draft");
}

#[tokio::test]
async fn publishing_unknown_post_is_not_found() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    let token = harness.sign_in(&ada).await;

    for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let response = harness
            .send(json_request(
                "POST",
                &format!("/api/posts/{id}/publish"),
                Some(&token),
                json!({}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{id}");
    }
}

#[tokio::test]
async fn session_endpoint_requires_a_session() {
    let harness = Harness::new();
    let response = harness.send(get("/api/session")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let ada = harness.store.add_user("Ada", "ada");
    let token = harness.sign_in(&ada).await;
    let request = Request::builder()
        .uri("/api/session")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = harness.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["username"], "ada");
}

#[tokio::test]
async fn forged_token_is_treated_as_anonymous() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    let token = harness.sign_in(&ada).await;
    let forged = format!("{}x", &token[..token.len() - 1]);

    let response = harness
        .send(json_request(
            "POST",
            "/api/posts",
            Some(&forged),
            json!({"title": "Hello", "content": "World"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn registered_user_can_sign_in() {
    let harness = Harness::new();

    let response = harness
        .send(json_request(
            "POST",
            "/api/users",
            None,
            json!({
                "name": "Grace",
                "username": "grace",
                "email": "Grace@Example.com",
                "password": "hunter22",
                "confirmPassword": "hunter22"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["user"]["email"], "grace@example.com");

    let response = harness
        .send(json_request(
            "POST",
            "/api/session",
            None,
            json!({"email": "grace@example.com", "password": "hunter22"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with(&format!("{COOKIE}=ps_")));
    assert!(set_cookie.contains("HttpOnly"));

    let response = harness
        .send(json_request(
            "POST",
            "/api/session",
            None,
            json!({"email": "grace@example.com", "password": "wrong-password"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mismatched_password_confirmation_is_rejected() {
    let harness = Harness::new();

    let response = harness
        .send(json_request(
            "POST",
            "/api/users",
            None,
            json!({
                "name": "Grace",
                "username": "grace",
                "email": "grace@example.com",
                "password": "hunter22",
                "confirmPassword": "hunter23"
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(
        body["error"]["hint"]
            .as_str()
            .is_some_and(|hint| hint.contains("confirm_password"))
    );
}

#[tokio::test]
async fn author_page_lists_only_their_posts() {
    let harness = Harness::new();
    let ada = harness.store.add_user("Ada", "ada");
    let bob = harness.store.add_user("Bob", "bob");
    harness.store.add_post(&ada, "By Ada", true, 1);
    harness.store.add_post(&bob, "By Bob", true, 2);

    let response = harness.send(get("/users/bob")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("By Bob"));
    assert!(!html.contains("By Ada"));
}

#[tokio::test]
async fn health_probe_reports_no_content() {
    let harness = Harness::new();
    let response = harness.send(get("/_health/db")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unknown_page_renders_not_found() {
    let harness = Harness::new();
    let response = harness.send(get("/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
