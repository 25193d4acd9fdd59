pub mod api;
mod middleware;
mod public;
pub mod session;

pub use api::{ApiState, build_api_router};
pub use public::{HttpState, build_public_router};
pub use session::{AuthState, SessionCookie};

use crate::application::error::ErrorReport;
use crate::application::error::HttpError;
use crate::application::repos::RepoError;
use axum::Router;
use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::response::{IntoResponse, Response};

use middleware::{log_responses, set_request_context};
use session::resolve_viewer;

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a repository error to a consistent HTTP error for the page surface.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub http: HttpState,
    pub api: ApiState,
    pub auth: AuthState,
}

impl FromRef<RouterState> for HttpState {
    fn from_ref(state: &RouterState) -> Self {
        state.http.clone()
    }
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

impl FromRef<RouterState> for AuthState {
    fn from_ref(state: &RouterState) -> Self {
        state.auth.clone()
    }
}

/// The full application: pages and API behind session resolution and request logging.
pub fn build_router(state: RouterState) -> Router {
    let auth = state.auth.clone();

    build_public_router(state.clone())
        .merge(build_api_router(state.clone()))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn_with_state(auth, resolve_viewer))
        .layer(axum_middleware::from_fn(set_request_context))
}
