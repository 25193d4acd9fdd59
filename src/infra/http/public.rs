use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        accounts::{AccountError, AccountService, RegisterInput, describe_validation},
        error::HttpError,
        listing::{ListingQuery, ListingService},
        posts::{PostError, PostService},
        repos::HealthRepo,
        session::{SessionError, SessionService, Viewer},
    },
    presentation::views::{
        FeedView, IndexTemplate, LayoutChrome, LayoutContext, LoginTemplate, LoginView,
        NewPostTemplate, NewPostView, RegisterTemplate, RegisterView, render_http_error_response,
        render_not_found_response, render_template_response,
    },
};

use super::{
    RouterState, db_health_response, repo_error_to_http,
    session::{
        CurrentViewer, MaybeSessionToken, MaybeViewer, SessionCookie, require_page_session,
        safe_next,
    },
};

const DRAFTS_PATH: &str = "/post/drafts";

#[derive(Clone)]
pub struct HttpState {
    pub listing: Arc<ListingService>,
    pub posts: Arc<PostService>,
    pub accounts: Arc<AccountService>,
    pub sessions: Arc<SessionService>,
    pub cookie: SessionCookie,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_public_router(state: RouterState) -> Router<RouterState> {
    let gated = Router::new()
        .route(DRAFTS_PATH, get(drafts))
        .route("/post/new", get(new_post_form).post(create_post))
        .route("/post/{id}/publish", post(publish_post))
        .route_layer(middleware::from_fn(require_page_session));

    Router::new()
        .route("/", get(index))
        .route("/users/{username}", get(user_posts))
        .route("/login", get(login_form).post(login))
        .route("/register", get(register_form).post(register))
        .route("/logout", post(logout))
        .route("/_health/db", get(public_health))
        .merge(gated)
        .fallback(fallback)
        .with_state(state)
}

async fn index(
    State(state): State<HttpState>,
    MaybeViewer(viewer): MaybeViewer,
    query: Result<Query<ListingQuery>, QueryRejection>,
) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref());
    let Ok(Query(query)) = query else {
        return render_not_found_response(chrome);
    };

    match state.listing.list_published(&query).await {
        Ok(Some(page)) => {
            let content = FeedView::from_page(
                page,
                "Public feed",
                "/",
                query.search_term.as_deref(),
                query.limit.as_deref(),
            );
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => render_http_error_response(chrome, err.into()),
    }
}

async fn user_posts(
    State(state): State<HttpState>,
    MaybeViewer(viewer): MaybeViewer,
    Path(username): Path<String>,
    query: Result<Query<ListingQuery>, QueryRejection>,
) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref()).titled(&username);
    let Ok(Query(query)) = query else {
        return render_not_found_response(chrome);
    };
    let query = ListingQuery {
        username: Some(username.clone()),
        ..query
    };

    match state.listing.list_published(&query).await {
        Ok(Some(page)) => {
            let base_path = format!("/users/{username}");
            let content = FeedView::from_page(
                page,
                format!("Posts by @{username}"),
                &base_path,
                query.search_term.as_deref(),
                query.limit.as_deref(),
            );
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => render_http_error_response(chrome, err.into()),
    }
}

async fn drafts(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    query: Result<Query<ListingQuery>, QueryRejection>,
) -> Response {
    let chrome = LayoutChrome::new(Some(&viewer)).titled("My drafts");
    let Ok(Query(query)) = query else {
        return render_not_found_response(chrome);
    };

    match state.listing.list_drafts(viewer.user_id, &query).await {
        Ok(Some(page)) => {
            let content = FeedView::from_page(
                page,
                "My drafts",
                DRAFTS_PATH,
                query.search_term.as_deref(),
                query.limit.as_deref(),
            )
            .with_publish_actions();
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => render_http_error_response(chrome, err.into()),
    }
}

async fn new_post_form(CurrentViewer(viewer): CurrentViewer) -> Response {
    let chrome = LayoutChrome::new(Some(&viewer)).titled("New draft");
    let view = LayoutContext::new(chrome, NewPostView::default());
    render_template_response(NewPostTemplate { view }, StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct NewPostForm {
    title: String,
    content: String,
}

async fn create_post(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Form(form): Form<NewPostForm>,
) -> Response {
    match state
        .posts
        .create_draft(viewer.user_id, &form.title, &form.content)
        .await
    {
        Ok(_) => Redirect::to(DRAFTS_PATH).into_response(),
        Err(PostError::Validation(err)) => {
            let chrome = LayoutChrome::new(Some(&viewer)).titled("New draft");
            let content = NewPostView {
                title: form.title,
                content: form.content,
                error: Some(err.to_string()),
            };
            let view = LayoutContext::new(chrome, content);
            render_template_response(NewPostTemplate { view }, StatusCode::UNPROCESSABLE_ENTITY)
        }
        Err(err) => post_error_response(&viewer, err),
    }
}

async fn publish_post(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::try_parse(&id) else {
        return render_not_found_response(LayoutChrome::new(Some(&viewer)));
    };

    match state.posts.publish(viewer.user_id, id).await {
        Ok(_) => Redirect::to(DRAFTS_PATH).into_response(),
        Err(err) => post_error_response(&viewer, err),
    }
}

fn post_error_response(viewer: &Viewer, err: PostError) -> Response {
    const SOURCE: &str = "infra::http::public::post_error_response";
    let chrome = LayoutChrome::new(Some(viewer));
    let error = match err {
        PostError::Validation(err) => HttpError::from_error(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "The post could not be saved",
            &err,
        ),
        PostError::NotFound => return render_not_found_response(chrome),
        PostError::NotAuthor => HttpError::new(
            SOURCE,
            StatusCode::FORBIDDEN,
            "Only the author can change this post",
            "viewer is not the post author",
        ),
        PostError::Repo(err) => repo_error_to_http(SOURCE, err),
    };
    render_http_error_response(chrome, error)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NextQuery {
    next: Option<String>,
}

async fn login_form(MaybeViewer(viewer): MaybeViewer, Query(query): Query<NextQuery>) -> Response {
    let next = safe_next(query.next.as_deref()).to_string();
    if viewer.is_some() {
        return Redirect::to(&next).into_response();
    }

    let content = LoginView {
        next,
        ..LoginView::default()
    };
    let view = LayoutContext::new(LayoutChrome::new(None).titled("Log in"), content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    password: String,
    #[serde(default)]
    next: Option<String>,
}

async fn login(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).to_string();

    match state.sessions.login(&form.email, &form.password).await {
        Ok(issued) => {
            let jar = jar.add(state.cookie.issue(issued.token));
            (jar, Redirect::to(&next)).into_response()
        }
        Err(SessionError::InvalidCredentials) => {
            let content = LoginView {
                email: form.email,
                next,
                error: Some("Email or password is incorrect.".to_string()),
            };
            let view = LayoutContext::new(LayoutChrome::new(None).titled("Log in"), content);
            render_template_response(LoginTemplate { view }, StatusCode::UNAUTHORIZED)
        }
        Err(SessionError::Repo(err)) => render_http_error_response(
            LayoutChrome::new(None),
            repo_error_to_http("infra::http::public::login", err),
        ),
    }
}

async fn register_form(MaybeViewer(viewer): MaybeViewer) -> Response {
    if viewer.is_some() {
        return Redirect::to("/").into_response();
    }
    let view = LayoutContext::new(
        LayoutChrome::new(None).titled("Sign up"),
        RegisterView::default(),
    );
    render_template_response(RegisterTemplate { view }, StatusCode::OK)
}

async fn register(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(input): Form<RegisterInput>,
) -> Response {
    const SOURCE: &str = "infra::http::public::register";
    let echo = RegisterView {
        name: input.name.clone(),
        username: input.username.clone(),
        email: input.email.clone(),
        error: None,
    };

    let message = match state.accounts.register(input).await {
        Ok(user) => match state.sessions.issue(&user).await {
            Ok(issued) => {
                info!(
                    target = "postboard::http::public",
                    user_id = %user.id,
                    "signed in after registration"
                );
                let jar = jar.add(state.cookie.issue(issued.token));
                return (jar, Redirect::to("/")).into_response();
            }
            Err(SessionError::InvalidCredentials) => return Redirect::to("/login").into_response(),
            Err(SessionError::Repo(err)) => {
                return render_http_error_response(
                    LayoutChrome::new(None),
                    repo_error_to_http(SOURCE, err),
                );
            }
        },
        Err(AccountError::Invalid(errors)) => describe_validation(&errors),
        Err(AccountError::EmailTaken) => "That email is already registered.".to_string(),
        Err(AccountError::UsernameTaken) => "That username is already taken.".to_string(),
        Err(AccountError::Hashing(detail)) => {
            return render_http_error_response(
                LayoutChrome::new(None),
                HttpError::new(
                    SOURCE,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Registration failed",
                    detail,
                ),
            );
        }
        Err(AccountError::Repo(err)) => {
            return render_http_error_response(
                LayoutChrome::new(None),
                repo_error_to_http(SOURCE, err),
            );
        }
    };

    let content = RegisterView {
        error: Some(message),
        ..echo
    };
    let view = LayoutContext::new(LayoutChrome::new(None).titled("Sign up"), content);
    render_template_response(RegisterTemplate { view }, StatusCode::UNPROCESSABLE_ENTITY)
}

async fn logout(
    State(state): State<HttpState>,
    jar: CookieJar,
    MaybeSessionToken(token): MaybeSessionToken,
) -> Response {
    if let Some(token) = token
        && let Err(SessionError::Repo(err)) = state.sessions.logout(&token).await
    {
        return render_http_error_response(
            LayoutChrome::new(None),
            repo_error_to_http("infra::http::public::logout", err),
        );
    }

    (jar.add(state.cookie.removal()), Redirect::to("/")).into_response()
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn fallback(MaybeViewer(viewer): MaybeViewer) -> Response {
    render_not_found_response(LayoutChrome::new(viewer.as_ref()))
}
