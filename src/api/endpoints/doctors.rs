//! Doctor directory endpoint.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::DoctorProfile;

/// `GET /api/doctors/:id`: first profile any directory source knows.
///
/// The lookup may call a remote directory over blocking HTTP, so it runs
/// on the blocking pool.
pub async fn profile(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DoctorProfile>, ApiError> {
    let core = ctx.core.clone();
    let id = doctor_id.clone();
    let resolved = tokio::task::spawn_blocking(move || -> Result<Option<DoctorProfile>, ApiError> {
        let conn = core.open_db()?;
        Ok(core.doctors().resolve(&conn, &id))
    })
    .await??;

    resolved
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Doctor not found: {doctor_id}")))
}
