use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub is_verified: bool,
    pub specialty: Option<String>,
    pub karma: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_verified_doctor(&self) -> bool {
        self.role == UserRole::Doctor && self.is_verified
    }
}

/// Where a resolved doctor profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    RemoteDirectory,
    DoctorProfile,
    UserAccount,
    StaticDirectory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub doctor_id: String,
    pub full_name: String,
    pub specialty: String,
    pub bio: Option<String>,
    pub years_experience: Option<u32>,
    #[serde(default = "default_profile_source")]
    pub source: ProfileSource,
}

fn default_profile_source() -> ProfileSource {
    ProfileSource::StaticDirectory
}
