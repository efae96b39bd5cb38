//! Appointment booking against doctor-defined weekly availability.
//!
//! A booking is checked against the doctor's slots and existing
//! appointments and written inside one immediate transaction, so two
//! concurrent requests for the same window cannot both succeed.
//! Approving a request opens the patient/doctor conversation.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, begin_immediate};
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::{AppointmentStatus, UserRole};
use crate::models::{hhmm, Appointment, AvailabilitySlot, Conversation, User};
use crate::users::require_user;

const MAX_REASON_CHARS: usize = 1000;

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSlot {
    pub doctor_id: Uuid,
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub slot_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub doctor_id: Uuid,
}

/// Which side of the appointment a listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Patient,
    Doctor,
}

impl std::str::FromStr for Participant {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Ok(Participant::Patient),
            "doctor" => Ok(Participant::Doctor),
            other => Err(ServiceError::Validation(format!(
                "role must be 'patient' or 'doctor', got '{other}'"
            ))),
        }
    }
}

// ─── Availability ─────────────────────────────────────────────────────────────

pub fn list_availability(conn: &Connection, doctor_id: &Uuid) -> ServiceResult<Vec<AvailabilitySlot>> {
    Ok(db::list_slots_by_doctor(conn, doctor_id)?)
}

fn validate_slot_window(day_of_week: u8, start: NaiveTime, end: NaiveTime) -> ServiceResult<()> {
    if day_of_week > 6 {
        return Err(ServiceError::Validation(
            "dayOfWeek must be between 0 (Sunday) and 6 (Saturday)".into(),
        ));
    }
    if !is_whole_minute(start) || !is_whole_minute(end) {
        return Err(ServiceError::Validation(
            "Slot boundaries must be whole minutes (HH:MM)".into(),
        ));
    }
    if start >= end {
        return Err(ServiceError::Validation("startTime must be before endTime".into()));
    }
    Ok(())
}

fn is_whole_minute(t: NaiveTime) -> bool {
    t.second() == 0 && t.nanosecond() == 0
}

fn require_doctor(conn: &Connection, doctor_id: &Uuid) -> ServiceResult<User> {
    let doctor = require_user(conn, doctor_id)?;
    if doctor.role != UserRole::Doctor {
        return Err(ServiceError::Forbidden("Only doctors can manage availability".into()));
    }
    Ok(doctor)
}

pub fn create_availability(conn: &Connection, new: NewSlot) -> ServiceResult<AvailabilitySlot> {
    validate_slot_window(new.day_of_week, new.start_time, new.end_time)?;
    require_doctor(conn, &new.doctor_id)?;

    let slot = AvailabilitySlot {
        id: Uuid::new_v4(),
        doctor_id: new.doctor_id,
        day_of_week: new.day_of_week,
        start_time: new.start_time,
        end_time: new.end_time,
        is_booked: false,
    };
    db::insert_slot(conn, &slot)?;

    tracing::info!(
        slot_id = %slot.id,
        doctor_id = %slot.doctor_id,
        day = slot.day_of_week,
        "Availability slot created"
    );
    Ok(slot)
}

/// Move a slot no live appointment refers to. Only the owning doctor may edit it.
pub fn update_availability(
    conn: &Connection,
    slot_id: &Uuid,
    update: NewSlot,
) -> ServiceResult<AvailabilitySlot> {
    validate_slot_window(update.day_of_week, update.start_time, update.end_time)?;

    let tx = begin_immediate(conn)?;
    let mut slot = db::get_slot(&tx, slot_id)?
        .ok_or_else(|| ServiceError::not_found("AvailabilitySlot", slot_id))?;
    if slot.doctor_id != update.doctor_id {
        return Err(ServiceError::Forbidden("Slot belongs to another doctor".into()));
    }
    if slot.is_booked {
        return Err(ServiceError::Conflict("A booked slot cannot be changed".into()));
    }
    if db::count_active_appointments_for_slot(&tx, slot_id)? > 0 {
        return Err(ServiceError::Conflict(
            "A slot with pending or approved appointments cannot be changed".into(),
        ));
    }
    slot.day_of_week = update.day_of_week;
    slot.start_time = update.start_time;
    slot.end_time = update.end_time;
    db::update_slot(&tx, &slot)?;
    tx.commit()?;

    tracing::info!(slot_id = %slot.id, "Availability slot updated");
    Ok(slot)
}

// ─── Booking ──────────────────────────────────────────────────────────────────

fn validate_booking(req: &BookingRequest, now: DateTime<Utc>) -> ServiceResult<()> {
    if req.end_time <= req.start_time {
        return Err(ServiceError::Validation("endTime must be after startTime".into()));
    }
    if req.start_time <= now {
        return Err(ServiceError::Validation("startTime must be in the future".into()));
    }
    if req.start_time.date_naive() != req.end_time.date_naive() {
        return Err(ServiceError::Validation(
            "An appointment must start and end on the same day".into(),
        ));
    }
    let reason = req.reason.trim();
    if reason.is_empty() || reason.chars().count() > MAX_REASON_CHARS {
        return Err(ServiceError::Validation(format!(
            "reason must be 1-{MAX_REASON_CHARS} characters"
        )));
    }
    Ok(())
}

/// Pick the slot a window books into: the requested one, or the first
/// covering slot of the doctor on that weekday, unbooked ones preferred.
fn resolve_slot(
    conn: &Connection,
    req: &BookingRequest,
    day_of_week: u8,
) -> ServiceResult<AvailabilitySlot> {
    let start = req.start_time.time();
    let end = req.end_time.time();

    if let Some(slot_id) = &req.slot_id {
        let slot = db::get_slot(conn, slot_id)?
            .ok_or_else(|| ServiceError::not_found("AvailabilitySlot", slot_id))?;
        if slot.doctor_id != req.doctor_id || !slot.covers(day_of_week, start, end) {
            return Err(ServiceError::Validation(
                "Requested time is outside the given availability slot".into(),
            ));
        }
        return Ok(slot);
    }

    let covering: Vec<AvailabilitySlot> = db::list_slots_by_doctor(conn, &req.doctor_id)?
        .into_iter()
        .filter(|s| s.covers(day_of_week, start, end))
        .collect();
    covering
        .iter()
        .find(|s| !s.is_booked)
        .or_else(|| covering.first())
        .cloned()
        .ok_or_else(|| {
            ServiceError::Validation("Doctor has no availability covering that time".into())
        })
}

/// Request an appointment. The result is PENDING until the doctor decides.
pub fn book_appointment(conn: &Connection, req: BookingRequest) -> ServiceResult<Appointment> {
    let now = Utc::now();
    validate_booking(&req, now)?;
    require_user(conn, &req.patient_id)?;
    let doctor = require_user(conn, &req.doctor_id)?;
    if doctor.role != UserRole::Doctor {
        return Err(ServiceError::Validation("doctorId does not belong to a doctor".into()));
    }

    let day_of_week = req.start_time.weekday().num_days_from_sunday() as u8;

    let tx = begin_immediate(conn)?;
    let slot = resolve_slot(&tx, &req, day_of_week)?;
    if slot.is_booked {
        return Err(ServiceError::Conflict("Availability slot is already booked".into()));
    }
    let overlapping =
        db::count_overlapping_appointments(&tx, &req.doctor_id, &req.start_time, &req.end_time)?;
    if overlapping > 0 {
        return Err(ServiceError::Conflict(
            "Doctor already has an appointment at that time".into(),
        ));
    }

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        doctor_id: req.doctor_id,
        slot_id: Some(slot.id),
        start_time: req.start_time,
        end_time: req.end_time,
        status: AppointmentStatus::Pending,
        reason: req.reason.trim().to_string(),
        created_at: now,
        updated_at: now,
    };
    db::insert_appointment(&tx, &appointment)?;
    if books_whole_slot(&slot, &appointment) {
        db::set_slot_booked(&tx, &slot.id, true)?;
    }
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        slot_id = %slot.id,
        "Appointment requested"
    );
    Ok(appointment)
}

fn books_whole_slot(slot: &AvailabilitySlot, appointment: &Appointment) -> bool {
    slot.start_time == appointment.start_time.time() && slot.end_time == appointment.end_time.time()
}

// ─── Decisions ────────────────────────────────────────────────────────────────

/// Approve or reject a pending appointment on behalf of its doctor.
pub fn set_appointment_status(
    conn: &Connection,
    appointment_id: &Uuid,
    change: StatusChange,
) -> ServiceResult<Appointment> {
    let tx = begin_immediate(conn)?;
    let mut appointment = db::get_appointment(&tx, appointment_id)?
        .ok_or_else(|| ServiceError::not_found("Appointment", appointment_id))?;
    if appointment.doctor_id != change.doctor_id {
        return Err(ServiceError::Forbidden(
            "Only the appointment's doctor can change its status".into(),
        ));
    }
    if !appointment.status.can_transition_to(change.status) {
        return Err(ServiceError::Conflict(format!(
            "Cannot change status from {} to {}",
            appointment.status, change.status
        )));
    }

    let now = Utc::now();
    db::update_appointment_status(&tx, appointment_id, change.status, &now)?;
    appointment.status = change.status;
    appointment.updated_at = now;

    match change.status {
        AppointmentStatus::Rejected => release_slot(&tx, &appointment)?,
        AppointmentStatus::Approved => open_conversation(&tx, &appointment)?,
        AppointmentStatus::Pending => {}
    }
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        status = %appointment.status,
        "Appointment status changed"
    );
    Ok(appointment)
}

fn release_slot(conn: &Connection, appointment: &Appointment) -> ServiceResult<()> {
    let Some(slot_id) = &appointment.slot_id else {
        return Ok(());
    };
    if let Some(slot) = db::get_slot(conn, slot_id)? {
        if slot.is_booked && books_whole_slot(&slot, appointment) {
            db::set_slot_booked(conn, slot_id, false)?;
        }
    }
    Ok(())
}

fn open_conversation(conn: &Connection, appointment: &Appointment) -> ServiceResult<()> {
    if db::find_conversation_by_appointment(conn, &appointment.id)?.is_some() {
        return Ok(());
    }
    let now = Utc::now();
    let conversation = Conversation {
        id: Uuid::new_v4(),
        participants: vec![appointment.patient_id, appointment.doctor_id],
        appointment_id: Some(appointment.id),
        created_at: now,
        updated_at: now,
    };
    db::insert_conversation(conn, &conversation)?;
    tracing::debug!(
        conversation_id = %conversation.id,
        appointment_id = %appointment.id,
        "Conversation opened for appointment"
    );
    Ok(())
}

pub fn list_appointments(
    conn: &Connection,
    user_id: &Uuid,
    role: Participant,
) -> ServiceResult<Vec<Appointment>> {
    let appointments = match role {
        Participant::Patient => db::list_appointments_for_patient(conn, user_id)?,
        Participant::Doctor => db::list_appointments_for_doctor(conn, user_id)?,
    };
    Ok(appointments)
}
