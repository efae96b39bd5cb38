//! User account endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, ApiJson};
use crate::models::User;
use crate::users::{self, NewUser};

/// `POST /api/users`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(new): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let conn = ctx.core.open_db()?;
    let user = users::create_user(&conn, new)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/users/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user_id = parse_id(&user_id, "user id")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(users::require_user(&conn, &user_id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub admin_id: uuid::Uuid,
}

/// `POST /api/users/:id/verify` body `{adminId}`
pub async fn verify(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
    ApiJson(body): ApiJson<VerifyRequest>,
) -> Result<Json<User>, ApiError> {
    let doctor_id = parse_id(&doctor_id, "user id")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(users::verify_doctor(&conn, &body.admin_id, &doctor_id)?))
}
