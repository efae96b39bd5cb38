//! Community endpoints: creation, membership and moderation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, require_id, ApiContext, ApiJson};
use crate::community::{self, CommunityUpdate, NewCommunity};
use crate::models::{Community, Moderator, ModeratorPermissions};

#[derive(Serialize)]
pub struct CommunitiesResponse {
    pub communities: Vec<Community>,
}

/// `GET /api/communities`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<CommunitiesResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let communities = community::list_communities(&conn)?;
    Ok(Json(CommunitiesResponse { communities }))
}

/// `POST /api/communities`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(new): ApiJson<NewCommunity>,
) -> Result<(StatusCode, Json<Community>), ApiError> {
    let conn = ctx.core.open_db()?;
    let created = community::create_community(&conn, new)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/communities/:name` (case-insensitive)
pub async fn get_by_name(
    State(ctx): State<ApiContext>,
    Path(name): Path<String>,
) -> Result<Json<Community>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(community::get_community_by_name(&conn, &name)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub update: CommunityUpdate,
}

/// `PUT /api/communities/:id` body `{userId, description}`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(community_id): Path<String>,
    ApiJson(body): ApiJson<UpdateRequest>,
) -> Result<Json<Community>, ApiError> {
    let community_id = parse_id(&community_id, "community id")?;
    let conn = ctx.core.open_db()?;
    let updated = community::update_community(&conn, &community_id, &body.user_id, body.update)?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRequest {
    pub user_id: Uuid,
}

/// `POST /api/communities/:id/join`
pub async fn join(
    State(ctx): State<ApiContext>,
    Path(community_id): Path<String>,
    ApiJson(body): ApiJson<MembershipRequest>,
) -> Result<Json<Community>, ApiError> {
    let community_id = parse_id(&community_id, "community id")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(community::join_community(&conn, &community_id, &body.user_id)?))
}

/// `POST /api/communities/:id/leave`
pub async fn leave(
    State(ctx): State<ApiContext>,
    Path(community_id): Path<String>,
    ApiJson(body): ApiJson<MembershipRequest>,
) -> Result<Json<Community>, ApiError> {
    let community_id = parse_id(&community_id, "community id")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(community::leave_community(&conn, &community_id, &body.user_id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddModeratorRequest {
    pub actor_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub permissions: ModeratorPermissions,
}

/// `POST /api/communities/:id/moderators`
pub async fn add_moderator(
    State(ctx): State<ApiContext>,
    Path(community_id): Path<String>,
    ApiJson(body): ApiJson<AddModeratorRequest>,
) -> Result<(StatusCode, Json<Moderator>), ApiError> {
    let community_id = parse_id(&community_id, "community id")?;
    let conn = ctx.core.open_db()?;
    let moderator = community::add_moderator(
        &conn,
        &community_id,
        &body.actor_id,
        &body.user_id,
        body.permissions,
    )?;
    Ok((StatusCode::CREATED, Json(moderator)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorParams {
    pub actor_id: Option<String>,
}

/// `DELETE /api/communities/:id/moderators/:userId?actorId`
pub async fn remove_moderator(
    State(ctx): State<ApiContext>,
    Path((community_id, user_id)): Path<(String, String)>,
    Query(params): Query<ActorParams>,
) -> Result<StatusCode, ApiError> {
    let community_id = parse_id(&community_id, "community id")?;
    let user_id = parse_id(&user_id, "user id")?;
    let actor_id = require_id(params.actor_id.as_deref(), "actorId")?;

    let conn = ctx.core.open_db()?;
    community::remove_moderator(&conn, &community_id, &actor_id, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}
