//! Shared application state handed to every request handler.

use std::path::PathBuf;

use crate::config::Settings;
use crate::db;
use crate::doctor_directory::{DirectoryError, DoctorResolver};
use crate::relay::RoomHub;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

/// Process-wide state, wrapped in `Arc` at startup.
///
/// Holds no database connection: handlers open their own through
/// `open_db` so no connection is shared across tasks.
pub struct CoreState {
    db_path: PathBuf,
    relay: RoomHub,
    doctors: DoctorResolver,
}

impl CoreState {
    pub fn new(db_path: PathBuf, doctors: DoctorResolver) -> Self {
        Self {
            db_path,
            relay: RoomHub::new(),
            doctors,
        }
    }

    /// Prepare the data directory, migrate the database and build the
    /// doctor resolver from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        if let Some(parent) = settings.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Migrate once up front so schema errors surface at startup.
        db::open_database(&settings.db_path)?;

        let doctors = DoctorResolver::standard(settings.doctor_directory_url.as_deref())?;
        tracing::info!(
            db_path = %settings.db_path.display(),
            doctor_sources = ?doctors.source_names(),
            "Core state initialized"
        );
        Ok(Self::new(settings.db_path.clone(), doctors))
    }

    /// Open a database connection. One per request; never held across `.await`.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn relay(&self) -> &RoomHub {
        &self.relay
    }

    pub fn doctors(&self) -> &DoctorResolver {
        &self.doctors
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Data directory error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Doctor directory error: {0}")]
    Directory(#[from] DirectoryError),
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            db_path: dir.join("nested").join("medthread.db"),
            doctor_directory_url: None,
        }
    }

    #[test]
    fn from_settings_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let state = CoreState::from_settings(&settings).unwrap();
        assert!(settings.db_path.exists());

        let conn = state.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 14);
    }

    #[test]
    fn connections_share_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::from_settings(&settings_in(dir.path())).unwrap();
        let first = state.open_db().unwrap();
        first
            .execute(
                "INSERT INTO users (id, username, role, created_at)
                 VALUES ('u1', 'alice', 'PATIENT', '2030-01-01T00:00:00.000Z')",
                [],
            )
            .unwrap();

        let second = state.open_db().unwrap();
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn resolver_uses_configured_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.doctor_directory_url = Some("http://directory.local".into());
        let state = CoreState::from_settings(&settings).unwrap();
        assert_eq!(state.doctors().source_names().len(), 4);
        assert_eq!(state.relay().room_count(), 0);
    }
}
