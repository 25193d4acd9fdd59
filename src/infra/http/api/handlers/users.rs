//! Registration handler

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use postboard_api_types::{RegisterRequest, UserEnvelope};

use crate::application::accounts::RegisterInput;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::user_to_api;
use crate::infra::http::api::state::ApiState;

use super::{account_to_api_error, json_rejection_to_api};

pub async fn register_user(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(json_rejection_to_api)?;

    let user = state
        .accounts
        .register(RegisterInput::from(payload))
        .await
        .map_err(account_to_api_error)?;

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            user: user_to_api(&user),
        }),
    ))
}
