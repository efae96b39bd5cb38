//! Thread endpoints: posting, replies and votes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, ApiJson};
use crate::models::{Reply, Thread};
use crate::reputation::{self, VoteOutcome};
use crate::threads::{self, NewThread, ThreadDetail};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub community_id: Option<String>,
}

#[derive(Serialize)]
pub struct ThreadsResponse {
    pub threads: Vec<Thread>,
}

/// `GET /api/threads?communityId`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<ThreadsResponse>, ApiError> {
    let community_id = params
        .community_id
        .as_deref()
        .map(|raw| parse_id(raw, "communityId"))
        .transpose()?;

    let conn = ctx.core.open_db()?;
    let threads = threads::list_threads(&conn, community_id.as_ref())?;
    Ok(Json(ThreadsResponse { threads }))
}

/// `POST /api/threads`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(new): ApiJson<NewThread>,
) -> Result<(StatusCode, Json<Thread>), ApiError> {
    let conn = ctx.core.open_db()?;
    let thread = threads::create_thread(&conn, new)?;
    Ok((StatusCode::CREATED, Json(thread)))
}

/// `GET /api/threads/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadDetail>, ApiError> {
    let thread_id = parse_id(&thread_id, "thread id")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(threads::get_thread(&conn, &thread_id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub author_id: Uuid,
    pub content: String,
}

/// `POST /api/threads/:id/replies`
pub async fn reply(
    State(ctx): State<ApiContext>,
    Path(thread_id): Path<String>,
    ApiJson(body): ApiJson<ReplyRequest>,
) -> Result<(StatusCode, Json<Reply>), ApiError> {
    let thread_id = parse_id(&thread_id, "thread id")?;
    let conn = ctx.core.open_db()?;
    let reply = threads::reply_to_thread(&conn, &thread_id, &body.author_id, &body.content)?;
    Ok((StatusCode::CREATED, Json(reply)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub user_id: Uuid,
    pub value: i64,
}

/// `POST /api/threads/:id/vote` body `{userId, value: -1|0|1}`
pub async fn vote(
    State(ctx): State<ApiContext>,
    Path(thread_id): Path<String>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> Result<Json<VoteOutcome>, ApiError> {
    let thread_id = parse_id(&thread_id, "thread id")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(reputation::vote_thread(&conn, &thread_id, &body.user_id, body.value)?))
}
