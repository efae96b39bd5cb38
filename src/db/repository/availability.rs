use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::{hhmm, AvailabilitySlot};

const SLOT_COLUMNS: &str = "id, doctor_id, day_of_week, start_time, end_time, is_booked";

pub fn insert_slot(conn: &Connection, slot: &AvailabilitySlot) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO availability_slots (id, doctor_id, day_of_week, start_time, end_time, is_booked)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            slot.id.to_string(),
            slot.doctor_id.to_string(),
            slot.day_of_week,
            hhmm::format(&slot.start_time),
            hhmm::format(&slot.end_time),
            slot.is_booked,
        ],
    )?;
    Ok(())
}

pub fn get_slot(conn: &Connection, id: &Uuid) -> Result<Option<AvailabilitySlot>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SLOT_COLUMNS} FROM availability_slots WHERE id = ?1"),
            params![id.to_string()],
            read_slot_row,
        )
        .optional()?;
    row.map(slot_from_row).transpose()
}

/// All slots of a doctor, in week order.
pub fn list_slots_by_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<AvailabilitySlot>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLOT_COLUMNS} FROM availability_slots WHERE doctor_id = ?1
         ORDER BY day_of_week ASC, start_time ASC"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], read_slot_row)?;

    let mut slots = Vec::new();
    for row in rows {
        slots.push(slot_from_row(row?)?);
    }
    Ok(slots)
}

/// Rewrites the window of an existing slot. The booked flag is left untouched.
pub fn update_slot(conn: &Connection, slot: &AvailabilitySlot) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE availability_slots SET day_of_week = ?2, start_time = ?3, end_time = ?4
         WHERE id = ?1",
        params![
            slot.id.to_string(),
            slot.day_of_week,
            hhmm::format(&slot.start_time),
            hhmm::format(&slot.end_time),
        ],
    )?;
    Ok(())
}

pub fn set_slot_booked(conn: &Connection, id: &Uuid, booked: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE availability_slots SET is_booked = ?2 WHERE id = ?1",
        params![id.to_string(), booked],
    )?;
    Ok(())
}

struct SlotRow {
    id: String,
    doctor_id: String,
    day_of_week: u8,
    start_time: String,
    end_time: String,
    is_booked: bool,
}

fn read_slot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SlotRow> {
    Ok(SlotRow {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        day_of_week: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        is_booked: row.get(5)?,
    })
}

fn slot_from_row(row: SlotRow) -> Result<AvailabilitySlot, DatabaseError> {
    let parse_time = |field: &str, raw: &str| {
        hhmm::parse(raw).ok_or_else(|| DatabaseError::InvalidValue {
            field: field.into(),
            value: raw.into(),
        })
    };
    Ok(AvailabilitySlot {
        id: parse_uuid("availability_slots.id", &row.id)?,
        doctor_id: parse_uuid("availability_slots.doctor_id", &row.doctor_id)?,
        day_of_week: row.day_of_week,
        start_time: parse_time("availability_slots.start_time", &row.start_time)?,
        end_time: parse_time("availability_slots.end_time", &row.end_time)?,
        is_booked: row.is_booked,
    })
}
