//! Session handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::CookieJar;
use postboard_api_types::{LoginRequest, User, UserEnvelope};
use validator::Validate;

use crate::application::accounts::{LoginInput, describe_validation};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::viewer_to_api;
use crate::infra::http::api::state::ApiState;
use crate::infra::http::session::{MaybeSessionToken, MaybeViewer};

use super::{json_rejection_to_api, session_to_api_error};

pub async fn create_session(
    State(state): State<ApiState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(json_rejection_to_api)?;
    let input = LoginInput {
        email: payload.email,
        password: payload.password,
    };
    input
        .validate()
        .map_err(|errors| ApiError::validation(describe_validation(&errors)))?;

    let issued = state
        .sessions
        .login(&input.email, &input.password)
        .await
        .map_err(session_to_api_error)?;

    let user: User = viewer_to_api(&issued.viewer);
    Ok((
        jar.add(state.cookie.issue(issued.token)),
        Json(UserEnvelope { user }),
    ))
}

pub async fn current_session(
    MaybeViewer(viewer): MaybeViewer,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer.ok_or_else(|| ApiError::unauthorized("No active session"))?;
    Ok(Json(UserEnvelope {
        user: viewer_to_api(&viewer),
    }))
}

pub async fn delete_session(
    State(state): State<ApiState>,
    jar: CookieJar,
    MaybeSessionToken(token): MaybeSessionToken,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = token {
        state
            .sessions
            .logout(&token)
            .await
            .map_err(session_to_api_error)?;
    }

    Ok((jar.add(state.cookie.removal()), StatusCode::NO_CONTENT))
}
