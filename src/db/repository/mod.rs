//! Repository layer: entity-scoped database operations.
//!
//! Functions take `&Connection` so callers can pass either a plain
//! connection or an open `Transaction` (which derefs to one).
//! All public functions are re-exported here.

mod appointment;
mod availability;
mod community;
mod conversation;
mod thread;
mod user;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use super::DatabaseError;

pub use appointment::*;
pub use availability::*;
pub use community::*;
pub use conversation::*;
pub use thread::*;
pub use user::*;

/// Storage format for timestamps: RFC 3339, UTC, millisecond precision.
/// Fixed width, so lexicographic order equals chronological order.
pub fn to_db_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidValue {
            field: field.into(),
            value: raw.into(),
        })
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: raw.into(),
    })
}
