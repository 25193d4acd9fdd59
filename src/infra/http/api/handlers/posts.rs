//! Posts handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use postboard_api_types::{CreatePostRequest, PostEnvelope};
use uuid::Uuid;

use crate::application::listing::ListingQuery;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{listing_to_api, post_to_api};
use crate::infra::http::api::state::ApiState;
use crate::infra::http::session::CurrentViewer;

use super::{
    json_rejection_to_api, listing_query_rejection_to_api, listing_to_api_error, post_to_api_error,
};

pub async fn list_posts(
    State(state): State<ApiState>,
    query: Result<Query<ListingQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(listing_query_rejection_to_api)?;
    let page = state
        .listing
        .list_published(&query)
        .await
        .map_err(listing_to_api_error)?
        .ok_or_else(|| ApiError::not_found("No posts for this query"))?;

    Ok(Json(listing_to_api(page)))
}

pub async fn create_post(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(json_rejection_to_api)?;

    let post = state
        .posts
        .create_draft(viewer.user_id, &payload.title, &payload.content)
        .await
        .map_err(post_to_api_error)?;

    Ok((
        StatusCode::CREATED,
        Json(PostEnvelope {
            post: post_to_api(post),
        }),
    ))
}

pub async fn publish_post(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::try_parse(&id).map_err(|_| ApiError::not_found("Post not found"))?;

    let post = state
        .posts
        .publish(viewer.user_id, id)
        .await
        .map_err(post_to_api_error)?;

    Ok(Json(PostEnvelope {
        post: post_to_api(post),
    }))
}
