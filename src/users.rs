//! User accounts: registration, lookup and doctor verification.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::UserRole;
use crate::models::User;

/// Usernames and community names share one handle format.
static HANDLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,21}$").unwrap());

pub fn is_valid_handle(name: &str) -> bool {
    HANDLE_PATTERN.is_match(name)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub specialty: Option<String>,
}

pub fn create_user(conn: &Connection, new: NewUser) -> ServiceResult<User> {
    if !is_valid_handle(&new.username) {
        return Err(ServiceError::Validation(
            "Username must be 3-21 characters: letters, digits or underscore".into(),
        ));
    }
    if let Some(email) = &new.email {
        if !email.contains('@') {
            return Err(ServiceError::Validation("Invalid email address".into()));
        }
    }

    let user = User {
        id: Uuid::new_v4(),
        username: new.username,
        email: new.email,
        display_name: new.display_name,
        role: new.role,
        is_verified: false,
        specialty: new.specialty,
        karma: 0,
        created_at: Utc::now(),
    };
    db::insert_user(conn, &user).map_err(|e| {
        if e.is_unique_violation() {
            ServiceError::Conflict("Username or email already taken".into())
        } else {
            e.into()
        }
    })?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    Ok(user)
}

/// Fetch a user or fail with not-found.
pub fn require_user(conn: &Connection, id: &Uuid) -> ServiceResult<User> {
    db::get_user(conn, id)?.ok_or_else(|| ServiceError::not_found("User", id))
}

/// Mark a doctor account as verified. Only administrators may do this.
pub fn verify_doctor(conn: &Connection, admin_id: &Uuid, doctor_id: &Uuid) -> ServiceResult<User> {
    let admin = require_user(conn, admin_id)?;
    if admin.role != UserRole::Admin {
        return Err(ServiceError::Forbidden(
            "Only administrators can verify doctors".into(),
        ));
    }
    let mut doctor = require_user(conn, doctor_id)?;
    if doctor.role != UserRole::Doctor {
        return Err(ServiceError::Validation("User is not a doctor".into()));
    }
    db::set_user_verified(conn, doctor_id, true)?;
    doctor.is_verified = true;

    tracing::info!(doctor_id = %doctor_id, "Doctor verified");
    Ok(doctor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn new_user(username: &str, role: UserRole) -> NewUser {
        NewUser {
            username: username.into(),
            email: None,
            display_name: None,
            role,
            specialty: None,
        }
    }

    #[test]
    fn handle_pattern_bounds() {
        assert!(is_valid_handle("abc"));
        assert!(is_valid_handle("Heart_Health_2024"));
        assert!(is_valid_handle(&"a".repeat(21)));
        assert!(!is_valid_handle("ab"));
        assert!(!is_valid_handle(&"a".repeat(22)));
        assert!(!is_valid_handle("has space"));
        assert!(!is_valid_handle("dash-name"));
        assert!(!is_valid_handle(""));
    }

    #[test]
    fn create_user_starts_unverified_with_zero_karma() {
        let conn = open_memory_database().unwrap();
        let user = create_user(&conn, new_user("drgrey", UserRole::Doctor)).unwrap();
        assert!(!user.is_verified);
        assert_eq!(user.karma, 0);
        let stored = require_user(&conn, &user.id).unwrap();
        assert_eq!(stored.username, "drgrey");
    }

    #[test]
    fn duplicate_username_conflicts() {
        let conn = open_memory_database().unwrap();
        create_user(&conn, new_user("alice", UserRole::Patient)).unwrap();
        let err = create_user(&conn, new_user("Alice", UserRole::Patient)).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn invalid_username_rejected() {
        let conn = open_memory_database().unwrap();
        let err = create_user(&conn, new_user("a b", UserRole::Patient)).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn only_admin_verifies_doctors() {
        let conn = open_memory_database().unwrap();
        let admin = create_user(&conn, new_user("root_admin", UserRole::Admin)).unwrap();
        let patient = create_user(&conn, new_user("patient1", UserRole::Patient)).unwrap();
        let doctor = create_user(&conn, new_user("drstrange", UserRole::Doctor)).unwrap();

        let err = verify_doctor(&conn, &patient.id, &doctor.id).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = verify_doctor(&conn, &admin.id, &patient.id).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let verified = verify_doctor(&conn, &admin.id, &doctor.id).unwrap();
        assert!(verified.is_verified_doctor());
        assert!(require_user(&conn, &doctor.id).unwrap().is_verified);
    }

    #[test]
    fn unknown_user_not_found() {
        let conn = open_memory_database().unwrap();
        let err = require_user(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "User", .. }));
    }
}
