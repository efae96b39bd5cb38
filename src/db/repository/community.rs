use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid, to_db_timestamp};
use crate::db::DatabaseError;
use crate::models::{Community, Moderator, ModeratorPermissions};

const COMMUNITY_COLUMNS: &str = "id, name, description, creator_id, member_count, created_at";

pub fn insert_community(conn: &Connection, community: &Community) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO communities (id, name, description, creator_id, member_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            community.id.to_string(),
            community.name,
            community.description,
            community.creator_id.to_string(),
            community.member_count,
            to_db_timestamp(&community.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_community(conn: &Connection, id: &Uuid) -> Result<Option<Community>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = ?1"),
            params![id.to_string()],
            read_community_row,
        )
        .optional()?;
    row.map(community_from_row).transpose()
}

/// Case-insensitive lookup (the column is `COLLATE NOCASE`).
pub fn get_community_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<Community>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE name = ?1"),
            params![name],
            read_community_row,
        )
        .optional()?;
    row.map(community_from_row).transpose()
}

pub fn list_communities(conn: &Connection) -> Result<Vec<Community>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMUNITY_COLUMNS} FROM communities ORDER BY member_count DESC, name ASC"
    ))?;
    let rows = stmt.query_map([], read_community_row)?;

    let mut communities = Vec::new();
    for row in rows {
        communities.push(community_from_row(row?)?);
    }
    Ok(communities)
}

pub fn update_community_description(
    conn: &Connection,
    id: &Uuid,
    description: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE communities SET description = ?2 WHERE id = ?1",
        params![id.to_string(), description],
    )?;
    Ok(())
}

pub fn adjust_member_count(conn: &Connection, id: &Uuid, delta: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE communities SET member_count = MAX(member_count + ?2, 0) WHERE id = ?1",
        params![id.to_string(), delta],
    )?;
    Ok(())
}

// ── Membership ──────────────────────────────────────────

pub fn insert_member(
    conn: &Connection,
    community_id: &Uuid,
    user_id: &Uuid,
    joined_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO community_members (community_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
        params![
            community_id.to_string(),
            user_id.to_string(),
            to_db_timestamp(joined_at),
        ],
    )?;
    Ok(())
}

/// Returns `true` if a membership row was removed.
pub fn delete_member(
    conn: &Connection,
    community_id: &Uuid,
    user_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM community_members WHERE community_id = ?1 AND user_id = ?2",
        params![community_id.to_string(), user_id.to_string()],
    )?;
    Ok(removed > 0)
}

pub fn is_member(conn: &Connection, community_id: &Uuid, user_id: &Uuid) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM community_members WHERE community_id = ?1 AND user_id = ?2)",
        params![community_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// ── Moderators ──────────────────────────────────────────

/// Insert a moderator record, replacing any existing permissions.
pub fn upsert_moderator(conn: &Connection, moderator: &Moderator) -> Result<(), DatabaseError> {
    let permissions = serde_json::to_string(&moderator.permissions).map_err(|e| {
        DatabaseError::InvalidValue {
            field: "community_moderators.permissions".into(),
            value: e.to_string(),
        }
    })?;
    conn.execute(
        "INSERT INTO community_moderators (community_id, user_id, permissions, added_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(community_id, user_id) DO UPDATE SET permissions = excluded.permissions",
        params![
            moderator.community_id.to_string(),
            moderator.user_id.to_string(),
            permissions,
            to_db_timestamp(&moderator.added_at),
        ],
    )?;
    Ok(())
}

pub fn get_moderator(
    conn: &Connection,
    community_id: &Uuid,
    user_id: &Uuid,
) -> Result<Option<Moderator>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT community_id, user_id, permissions, added_at FROM community_moderators
             WHERE community_id = ?1 AND user_id = ?2",
            params![community_id.to_string(), user_id.to_string()],
            read_moderator_row,
        )
        .optional()?;
    row.map(moderator_from_row).transpose()
}

pub fn list_moderators(conn: &Connection, community_id: &Uuid) -> Result<Vec<Moderator>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT community_id, user_id, permissions, added_at FROM community_moderators
         WHERE community_id = ?1 ORDER BY added_at ASC",
    )?;
    let rows = stmt.query_map(params![community_id.to_string()], read_moderator_row)?;

    let mut moderators = Vec::new();
    for row in rows {
        moderators.push(moderator_from_row(row?)?);
    }
    Ok(moderators)
}

pub fn count_moderators(conn: &Connection, community_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM community_moderators WHERE community_id = ?1",
        params![community_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_moderator(
    conn: &Connection,
    community_id: &Uuid,
    user_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM community_moderators WHERE community_id = ?1 AND user_id = ?2",
        params![community_id.to_string(), user_id.to_string()],
    )?;
    Ok(removed > 0)
}

struct CommunityRow {
    id: String,
    name: String,
    description: Option<String>,
    creator_id: String,
    member_count: i64,
    created_at: String,
}

fn read_community_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommunityRow> {
    Ok(CommunityRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        creator_id: row.get(3)?,
        member_count: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn community_from_row(row: CommunityRow) -> Result<Community, DatabaseError> {
    Ok(Community {
        id: parse_uuid("communities.id", &row.id)?,
        name: row.name,
        description: row.description,
        creator_id: parse_uuid("communities.creator_id", &row.creator_id)?,
        member_count: row.member_count,
        created_at: parse_timestamp("communities.created_at", &row.created_at)?,
    })
}

struct ModeratorRow {
    community_id: String,
    user_id: String,
    permissions: String,
    added_at: String,
}

fn read_moderator_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ModeratorRow> {
    Ok(ModeratorRow {
        community_id: row.get(0)?,
        user_id: row.get(1)?,
        permissions: row.get(2)?,
        added_at: row.get(3)?,
    })
}

fn moderator_from_row(row: ModeratorRow) -> Result<Moderator, DatabaseError> {
    let permissions: ModeratorPermissions =
        serde_json::from_str(&row.permissions).map_err(|_| DatabaseError::InvalidValue {
            field: "community_moderators.permissions".into(),
            value: row.permissions.clone(),
        })?;
    Ok(Moderator {
        community_id: parse_uuid("community_moderators.community_id", &row.community_id)?,
        user_id: parse_uuid("community_moderators.user_id", &row.user_id)?,
        permissions,
        added_at: parse_timestamp("community_moderators.added_at", &row.added_at)?,
    })
}
