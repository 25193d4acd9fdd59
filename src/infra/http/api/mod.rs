pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    handler::Handler,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::RouterState;
use crate::infra::http::session::require_api_session;

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let gate = || axum_middleware::from_fn(require_api_session);

    Router::new()
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post.layer(gate())),
        )
        .route(
            "/api/posts/{id}/publish",
            post(handlers::publish_post.layer(gate())),
        )
        .route("/api/users", post(handlers::register_user))
        .route(
            "/api/session",
            get(handlers::current_session)
                .post(handlers::create_session)
                .delete(handlers::delete_session),
        )
        .with_state(state)
}
