use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use postboard::application::pagination::PageRequest;
use postboard::application::repos::{
    CreatePostParams, CreateSessionParams, CreateUserParams, HealthRepo, PostListScope,
    PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UsersRepo,
};
use postboard::domain::entities::{PostRecord, UserRecord};
use postboard::infra::db::PostgresRepositories;

async fn user(repos: &PostgresRepositories, name: &str, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            name: name.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "$argon2id$placeholder".to_string(),
        })
        .await
        .expect("create user")
}

async fn post(
    repos: &PostgresRepositories,
    author: &UserRecord,
    title: &str,
    published: bool,
) -> PostRecord {
    repos
        .create_post(CreatePostParams {
            title: title.to_string(),
            content: format!("{title} body"),
            author_id: author.id,
            published,
        })
        .await
        .expect("create post")
}

async fn age_post(pool: &PgPool, id: Uuid, minutes: i64) {
    sqlx::query("UPDATE posts SET updated_at = now() - make_interval(mins => $2) WHERE id = $1")
        .bind(id)
        .bind(minutes as i32)
        .execute(pool)
        .await
        .expect("age post");
}

fn filter(search: Option<&str>, username: Option<&str>) -> PostQueryFilter {
    PostQueryFilter {
        search: search.map(str::to_string),
        username: username.map(str::to_string),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn published_listing_is_newest_first_and_windowed(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let ada = user(&repos, "Ada", "ada").await;

    for minutes in 0..7 {
        let record = post(&repos, &ada, &format!("Post {minutes}"), true).await;
        age_post(&pool, record.id, minutes).await;
    }
    post(&repos, &ada, "Hidden draft", false).await;

    let scope = PostListScope::Published;
    let total = repos
        .count_posts(scope, &PostQueryFilter::default())
        .await
        .expect("count");
    assert_eq!(total, 7);

    let window = PageRequest::new(3, 3).expect("request").window();
    let rows = repos
        .list_posts(scope, &PostQueryFilter::default(), window)
        .await
        .expect("list");
    let titles: Vec<_> = rows.iter().map(|row| row.post.title.as_str()).collect();
    assert_eq!(titles, ["Post 6"]);
    assert_eq!(rows[0].author.username, "ada");
}

#[sqlx::test(migrations = "./migrations")]
async fn search_covers_title_and_author_name(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let ada = user(&repos, "Ada Lovelace", "ada").await;
    let bob = user(&repos, "Bob", "bob").await;
    post(&repos, &ada, "Analytical engines", true).await;
    post(&repos, &bob, "Learning Rust today", true).await;
    post(&repos, &bob, "Rust draft", false).await;

    let scope = PostListScope::Published;
    let window = PageRequest::new(1, 10).expect("request").window();

    let by_title = repos
        .list_posts(scope, &filter(Some("rust"), None), window)
        .await
        .expect("title search");
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].post.title, "Learning Rust today");

    let by_author = repos
        .count_posts(scope, &filter(Some("lovelace"), None))
        .await
        .expect("author search");
    assert_eq!(by_author, 1);

    let narrowed = repos
        .count_posts(scope, &filter(Some("rust"), Some("ada")))
        .await
        .expect("narrowed search");
    assert_eq!(narrowed, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn drafts_scope_is_private_to_the_author(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let ada = user(&repos, "Ada", "ada").await;
    let bob = user(&repos, "Bob", "bob").await;
    post(&repos, &ada, "Ada draft", false).await;
    post(&repos, &ada, "Ada published", true).await;
    post(&repos, &bob, "Bob draft", false).await;

    let rows = repos
        .list_posts(
            PostListScope::DraftsOf(ada.id),
            &PostQueryFilter::default(),
            PageRequest::new(1, 10).expect("request").window(),
        )
        .await
        .expect("drafts");
    let titles: Vec<_> = rows.iter().map(|row| row.post.title.as_str()).collect();
    assert_eq!(titles, ["Ada draft"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn publishing_flips_the_flag(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let ada = user(&repos, "Ada", "ada").await;
    let draft = post(&repos, &ada, "Draft", false).await;

    let published = repos.publish_post(draft.id).await.expect("publish");
    assert!(published.published);
    assert!(published.updated_at >= draft.updated_at);

    let missing = repos.publish_post(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(RepoError::NotFound)));
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_email_names_the_constraint(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    user(&repos, "Ada", "ada").await;

    let err = repos
        .create_user(CreateUserParams {
            name: "Other".into(),
            username: "other".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$placeholder".into(),
        })
        .await
        .expect_err("duplicate email");
    assert!(matches!(
        err,
        RepoError::Duplicate { ref constraint } if constraint == "users_email_key"
    ));
}

#[sqlx::test(migrations = "./migrations")]
async fn expired_sessions_are_purged(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let ada = user(&repos, "Ada", "ada").await;
    let now = OffsetDateTime::now_utc();

    let live = repos
        .create_session(CreateSessionParams {
            id: Uuid::new_v4(),
            user_id: ada.id,
            hashed_secret: vec![1; 32],
            expires_at: now + Duration::hours(1),
        })
        .await
        .expect("live session");
    let stale = repos
        .create_session(CreateSessionParams {
            id: Uuid::new_v4(),
            user_id: ada.id,
            hashed_secret: vec![2; 32],
            expires_at: now - Duration::hours(1),
        })
        .await
        .expect("stale session");

    assert_eq!(repos.delete_expired(now).await.expect("purge"), 1);
    assert!(repos.find_session(live.id).await.expect("find").is_some());
    assert!(repos.find_session(stale.id).await.expect("find").is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn health_probe_round_trips(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    repos.ping().await.expect("ping");
}
