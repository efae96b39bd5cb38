use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid, to_db_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;
use crate::models::Appointment;

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, slot_id, start_time, end_time, \
                                   status, reason, created_at, updated_at";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, slot_id, start_time, end_time,
                                   status, reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.slot_id.map(|id| id.to_string()),
            to_db_timestamp(&appt.start_time),
            to_db_timestamp(&appt.end_time),
            appt.status.as_str(),
            appt.reason,
            to_db_timestamp(&appt.created_at),
            to_db_timestamp(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id.to_string()],
            read_appointment_row,
        )
        .optional()?;
    row.map(appointment_from_row).transpose()
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(
        conn,
        &format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE patient_id = ?1
             ORDER BY start_time ASC"
        ),
        patient_id,
    )
}

pub fn list_appointments_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(
        conn,
        &format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE doctor_id = ?1
             ORDER BY start_time ASC"
        ),
        doctor_id,
    )
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
    updated_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), status.as_str(), to_db_timestamp(updated_at)],
    )?;
    Ok(())
}

/// Count non-rejected appointments of a doctor intersecting `[start, end)`.
pub fn count_overlapping_appointments(
    conn: &Connection,
    doctor_id: &Uuid,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE doctor_id = ?1 AND status != 'REJECTED'
           AND start_time < ?3 AND end_time > ?2",
        params![
            doctor_id.to_string(),
            to_db_timestamp(start),
            to_db_timestamp(end),
        ],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Count non-rejected appointments booked into a slot.
pub fn count_active_appointments_for_slot(
    conn: &Connection,
    slot_id: &Uuid,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE slot_id = ?1 AND status != 'REJECTED'",
        params![slot_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn query_appointments(
    conn: &Connection,
    sql: &str,
    user_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![user_id.to_string()], read_appointment_row)?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(appointment_from_row(row?)?);
    }
    Ok(appointments)
}

struct AppointmentRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    slot_id: Option<String>,
    start_time: String,
    end_time: String,
    status: String,
    reason: String,
    created_at: String,
    updated_at: String,
}

fn read_appointment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        slot_id: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        status: row.get(6)?,
        reason: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid("appointments.id", &row.id)?,
        patient_id: parse_uuid("appointments.patient_id", &row.patient_id)?,
        doctor_id: parse_uuid("appointments.doctor_id", &row.doctor_id)?,
        slot_id: row
            .slot_id
            .as_deref()
            .map(|id| parse_uuid("appointments.slot_id", id))
            .transpose()?,
        start_time: parse_timestamp("appointments.start_time", &row.start_time)?,
        end_time: parse_timestamp("appointments.end_time", &row.end_time)?,
        status: AppointmentStatus::from_str(&row.status)?,
        reason: row.reason,
        created_at: parse_timestamp("appointments.created_at", &row.created_at)?,
        updated_at: parse_timestamp("appointments.updated_at", &row.updated_at)?,
    })
}
