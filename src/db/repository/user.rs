use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid, to_db_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::UserRole;
use crate::models::{DoctorProfile, ProfileSource, User};

const USER_COLUMNS: &str =
    "id, username, email, display_name, role, is_verified, specialty, karma, created_at";

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, username, email, display_name, role, is_verified, specialty, karma, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id.to_string(),
            user.username,
            user.email,
            user.display_name,
            user.role.as_str(),
            user.is_verified,
            user.specialty,
            user.karma,
            to_db_timestamp(&user.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            read_user_row,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

/// Look up a user by a raw id string (no UUID validation on the input).
pub fn get_user_by_raw_id(conn: &Connection, id: &str) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            read_user_row,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn list_verified_doctors(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE role = 'DOCTOR' AND is_verified = 1 ORDER BY username ASC"
    ))?;
    let rows = stmt.query_map([], read_user_row)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(user_from_row(row?)?);
    }
    Ok(users)
}

pub fn set_user_verified(conn: &Connection, id: &Uuid, verified: bool) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_verified = ?2 WHERE id = ?1",
        params![id.to_string(), verified],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn adjust_karma(conn: &Connection, id: &Uuid, delta: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET karma = karma + ?2 WHERE id = ?1",
        params![id.to_string(), delta],
    )?;
    Ok(())
}

pub fn insert_doctor_profile(
    conn: &Connection,
    profile: &DoctorProfile,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO doctor_profiles (user_id, full_name, specialty, bio, years_experience)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            profile.doctor_id,
            profile.full_name,
            profile.specialty,
            profile.bio,
            profile.years_experience,
        ],
    )?;
    Ok(())
}

pub fn get_doctor_profile(
    conn: &Connection,
    doctor_id: &str,
) -> Result<Option<DoctorProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            "SELECT user_id, full_name, specialty, bio, years_experience
             FROM doctor_profiles WHERE user_id = ?1",
            params![doctor_id],
            |row| {
                Ok(DoctorProfile {
                    doctor_id: row.get(0)?,
                    full_name: row.get(1)?,
                    specialty: row.get(2)?,
                    bio: row.get(3)?,
                    years_experience: row.get(4)?,
                    source: ProfileSource::DoctorProfile,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

struct UserRow {
    id: String,
    username: String,
    email: Option<String>,
    display_name: Option<String>,
    role: String,
    is_verified: bool,
    specialty: Option<String>,
    karma: i64,
    created_at: String,
}

fn read_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        role: row.get(4)?,
        is_verified: row.get(5)?,
        specialty: row.get(6)?,
        karma: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: parse_uuid("users.id", &row.id)?,
        username: row.username,
        email: row.email,
        display_name: row.display_name,
        role: UserRole::from_str(&row.role)?,
        is_verified: row.is_verified,
        specialty: row.specialty,
        karma: row.karma,
        created_at: parse_timestamp("users.created_at", &row.created_at)?,
    })
}
