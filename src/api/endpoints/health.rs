//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub relay_connections: usize,
    pub relay_rooms: usize,
}

/// `GET /api/health`: liveness plus a database round-trip.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let database = match ctx.core.open_db() {
        Ok(conn) => conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok(),
        Err(_) => false,
    };
    if !database {
        tracing::warn!("Health check could not reach the database");
    }

    let relay = ctx.core.relay();
    Ok(Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: crate::config::APP_VERSION,
        database,
        relay_connections: relay.connection_count(),
        relay_rooms: relay.room_count(),
    }))
}
