//! Doctor profile lookup across several sources.
//!
//! `DoctorResolver` asks each `DoctorLookup` in order and returns the first
//! profile found. A source that fails is logged and skipped, so a remote
//! directory outage degrades to local data instead of an error.

use std::collections::HashMap;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::enums::UserRole;
use crate::models::{DoctorProfile, ProfileSource};

const REMOTE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SPECIALTY: &str = "General Practice";

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Invalid directory data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One source of doctor profiles. Implementations block; call them from
/// `spawn_blocking`.
pub trait DoctorLookup: Send + Sync {
    fn name(&self) -> &'static str;

    fn lookup(&self, conn: &Connection, doctor_id: &str) -> Result<Option<DoctorProfile>, DirectoryError>;
}

// ─── Sources ──────────────────────────────────────────────

/// External directory service: `GET {base_url}/doctors/{id}`.
pub struct RemoteDirectory {
    base_url: String,
    timeout: Duration,
}

impl RemoteDirectory {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(REMOTE_TIMEOUT_SECS),
        }
    }
}

impl DoctorLookup for RemoteDirectory {
    fn name(&self) -> &'static str {
        "remote_directory"
    }

    fn lookup(&self, _conn: &Connection, doctor_id: &str) -> Result<Option<DoctorProfile>, DirectoryError> {
        // Built per call: a blocking client must not live on an async worker.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let response = client
            .get(format!("{}/doctors/{}", self.base_url, doctor_id))
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let mut profile: DoctorProfile = response.error_for_status()?.json()?;
        profile.doctor_id = doctor_id.to_string();
        profile.source = ProfileSource::RemoteDirectory;
        Ok(Some(profile))
    }
}

/// Extended profile rows in `doctor_profiles`.
pub struct ProfileTable;

impl DoctorLookup for ProfileTable {
    fn name(&self) -> &'static str {
        "doctor_profiles"
    }

    fn lookup(&self, conn: &Connection, doctor_id: &str) -> Result<Option<DoctorProfile>, DirectoryError> {
        Ok(db::get_doctor_profile(conn, doctor_id)?)
    }
}

/// Bare doctor accounts with no extended profile.
pub struct UserAccounts;

impl DoctorLookup for UserAccounts {
    fn name(&self) -> &'static str {
        "users"
    }

    fn lookup(&self, conn: &Connection, doctor_id: &str) -> Result<Option<DoctorProfile>, DirectoryError> {
        let Some(user) = db::get_user_by_raw_id(conn, doctor_id)? else {
            return Ok(None);
        };
        if user.role != UserRole::Doctor {
            return Ok(None);
        }
        Ok(Some(DoctorProfile {
            doctor_id: user.id.to_string(),
            full_name: user.display_name.unwrap_or(user.username),
            specialty: user.specialty.unwrap_or_else(|| DEFAULT_SPECIALTY.to_string()),
            bio: None,
            years_experience: None,
            source: ProfileSource::UserAccount,
        }))
    }
}

/// Directory bundled with the binary.
pub struct StaticDirectory {
    entries: HashMap<String, DoctorProfile>,
}

impl StaticDirectory {
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let profiles: Vec<DoctorProfile> = serde_json::from_str(json)?;
        let entries = profiles
            .into_iter()
            .map(|mut p| {
                p.source = ProfileSource::StaticDirectory;
                (p.doctor_id.clone(), p)
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn bundled() -> Result<Self, DirectoryError> {
        Self::from_json(include_str!("../resources/doctors.json"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DoctorLookup for StaticDirectory {
    fn name(&self) -> &'static str {
        "static_directory"
    }

    fn lookup(&self, _conn: &Connection, doctor_id: &str) -> Result<Option<DoctorProfile>, DirectoryError> {
        Ok(self.entries.get(doctor_id).cloned())
    }
}

// ─── Resolver ─────────────────────────────────────────────

pub struct DoctorResolver {
    sources: Vec<Box<dyn DoctorLookup>>,
}

impl DoctorResolver {
    pub fn new(sources: Vec<Box<dyn DoctorLookup>>) -> Self {
        Self { sources }
    }

    /// Remote directory (when configured), then the database, then the
    /// bundled directory.
    pub fn standard(remote_url: Option<&str>) -> Result<Self, DirectoryError> {
        let mut sources: Vec<Box<dyn DoctorLookup>> = Vec::new();
        if let Some(url) = remote_url {
            sources.push(Box::new(RemoteDirectory::new(url)));
        }
        sources.push(Box::new(ProfileTable));
        sources.push(Box::new(UserAccounts));
        sources.push(Box::new(StaticDirectory::bundled()?));
        Ok(Self::new(sources))
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(&self, conn: &Connection, doctor_id: &str) -> Option<DoctorProfile> {
        for source in &self.sources {
            match source.lookup(conn, doctor_id) {
                Ok(Some(profile)) => {
                    tracing::debug!(doctor_id, source = source.name(), "Doctor profile resolved");
                    return Some(profile);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        doctor_id,
                        source = source.name(),
                        error = %e,
                        "Doctor lookup failed, trying next source"
                    );
                }
            }
        }
        None
    }
}
