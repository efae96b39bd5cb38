use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A single moderator capability checked by community operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeratorPermission {
    /// Add or remove moderators.
    Access,
    /// Edit community settings.
    Config,
}

/// Bag of moderator flags. `all` grants every permission.
///
/// `posts` and `flair` are stored and returned as granted; no operation
/// checks them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeratorPermissions {
    pub all: bool,
    pub access: bool,
    pub config: bool,
    pub posts: bool,
    pub flair: bool,
}

impl ModeratorPermissions {
    pub fn full() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn has(&self, permission: ModeratorPermission) -> bool {
        if self.all {
            return true;
        }
        match permission {
            ModeratorPermission::Access => self.access,
            ModeratorPermission::Config => self.config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Moderator {
    pub community_id: Uuid,
    pub user_id: Uuid,
    pub permissions: ModeratorPermissions,
    pub added_at: DateTime<Utc>,
}
