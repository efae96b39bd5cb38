//! Appointment and availability endpoints.
//!
//! - `GET  /api/appointments/appointments?userId&role`
//! - `PUT  /api/appointments/appointments/:id`
//! - `POST /api/appointments/book`
//! - `GET  /api/appointments/doctors/:id/availability`
//! - `POST /api/appointments/availability`
//! - `PUT  /api/appointments/availability/:id`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_id, require_id, ApiContext, ApiJson};
use crate::appointment::{self, BookingRequest, NewSlot, Participant, StatusChange};
use crate::models::{Appointment, AvailabilitySlot};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

/// `GET /api/appointments/appointments?userId&role=patient|doctor`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let user_id = require_id(params.user_id.as_deref(), "userId")?;
    let role: Participant = params
        .role
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing role".into()))?
        .parse()?;

    let conn = ctx.core.open_db()?;
    let appointments = appointment::list_appointments(&conn, &user_id, role)?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `PUT /api/appointments/appointments/:id` body `{status, doctorId}`
pub async fn set_status(
    State(ctx): State<ApiContext>,
    Path(appointment_id): Path<String>,
    ApiJson(change): ApiJson<StatusChange>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment_id = parse_id(&appointment_id, "appointment id")?;
    let conn = ctx.core.open_db()?;
    let updated = appointment::set_appointment_status(&conn, &appointment_id, change)?;
    Ok(Json(updated))
}

/// `POST /api/appointments/book`
pub async fn book(
    State(ctx): State<ApiContext>,
    ApiJson(request): ApiJson<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let conn = ctx.core.open_db()?;
    let created = appointment::book_appointment(&conn, request)?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub slots: Vec<AvailabilitySlot>,
}

/// `GET /api/appointments/doctors/:id/availability`
pub async fn availability(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let doctor_id = parse_id(&doctor_id, "doctor id")?;
    let conn = ctx.core.open_db()?;
    let slots = appointment::list_availability(&conn, &doctor_id)?;
    Ok(Json(AvailabilityResponse { slots }))
}

/// `POST /api/appointments/availability`
pub async fn create_slot(
    State(ctx): State<ApiContext>,
    ApiJson(new): ApiJson<NewSlot>,
) -> Result<(StatusCode, Json<AvailabilitySlot>), ApiError> {
    let conn = ctx.core.open_db()?;
    let slot = appointment::create_availability(&conn, new)?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// `PUT /api/appointments/availability/:id`
pub async fn update_slot(
    State(ctx): State<ApiContext>,
    Path(slot_id): Path<String>,
    ApiJson(update): ApiJson<NewSlot>,
) -> Result<Json<AvailabilitySlot>, ApiError> {
    let slot_id = parse_id(&slot_id, "slot id")?;
    let conn = ctx.core.open_db()?;
    let slot = appointment::update_availability(&conn, &slot_id, update)?;
    Ok(Json(slot))
}
