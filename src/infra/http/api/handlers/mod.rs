//! API handlers organized by resource type.
//!
//! Error conversion helpers shared by the resource modules live here.

mod posts;
mod session;
mod users;

pub use posts::*;
pub use session::*;
pub use users::*;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;

use crate::application::accounts::{AccountError, describe_validation};
use crate::application::listing::ListingError;
use crate::application::posts::PostError;
use crate::application::repos::RepoError;
use crate::application::session::SessionError;

use super::error::{ApiError, codes};

fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => {
            ApiError::conflict("Duplicate record").with_detail(constraint)
        }
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            None,
        )
        .with_detail(message),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            None,
        )
        .with_detail(message),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            None,
        )
        .with_detail(message),
    }
}

fn listing_to_api_error(err: ListingError) -> ApiError {
    match err {
        ListingError::Repo(err) => repo_to_api(err),
    }
}

fn post_to_api_error(err: PostError) -> ApiError {
    match err {
        PostError::Validation(err) => ApiError::validation(err.to_string()),
        PostError::NotFound => ApiError::not_found("Post not found"),
        PostError::NotAuthor => ApiError::not_author(),
        PostError::Repo(err) => repo_to_api(err),
    }
}

fn account_to_api_error(err: AccountError) -> ApiError {
    match err {
        AccountError::Invalid(errors) => ApiError::validation(describe_validation(&errors)),
        AccountError::EmailTaken => ApiError::conflict("Email is already registered"),
        AccountError::UsernameTaken => ApiError::conflict("Username is already taken"),
        AccountError::Hashing(message) => ApiError::internal(message),
        AccountError::Repo(err) => repo_to_api(err),
    }
}

fn session_to_api_error(err: SessionError) -> ApiError {
    match err {
        SessionError::InvalidCredentials => {
            ApiError::unauthorized("Email or password is incorrect")
        }
        SessionError::Repo(err) => repo_to_api(err),
    }
}

fn listing_query_rejection_to_api(rejection: QueryRejection) -> ApiError {
    ApiError::not_found("No posts for this query").with_detail(rejection.body_text())
}

fn json_rejection_to_api(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("Malformed JSON body", Some(rejection.body_text()))
}
