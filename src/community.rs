//! Communities: creation, membership and moderator permissions.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, begin_immediate};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Community, Moderator, ModeratorPermission, ModeratorPermissions};
use crate::users::{is_valid_handle, require_user};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommunity {
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityUpdate {
    pub description: Option<String>,
}

/// Create a community. The creator becomes its first member and a
/// moderator holding every permission.
pub fn create_community(conn: &Connection, new: NewCommunity) -> ServiceResult<Community> {
    if !is_valid_handle(&new.name) {
        return Err(ServiceError::Validation(
            "Community name must be 3-21 characters: letters, digits or underscore".into(),
        ));
    }
    require_user(conn, &new.creator_id)?;

    let now = Utc::now();
    let community = Community {
        id: Uuid::new_v4(),
        name: new.name,
        description: new.description,
        creator_id: new.creator_id,
        member_count: 1,
        created_at: now,
    };

    let tx = begin_immediate(conn)?;
    db::insert_community(&tx, &community).map_err(|e| {
        if e.is_unique_violation() {
            ServiceError::Conflict(format!("Community '{}' already exists", community.name))
        } else {
            e.into()
        }
    })?;
    db::insert_member(&tx, &community.id, &community.creator_id, &now)?;
    db::upsert_moderator(
        &tx,
        &Moderator {
            community_id: community.id,
            user_id: community.creator_id,
            permissions: ModeratorPermissions::full(),
            added_at: now,
        },
    )?;
    tx.commit()?;

    tracing::info!(community_id = %community.id, name = %community.name, "Community created");
    Ok(community)
}

pub fn get_community_by_name(conn: &Connection, name: &str) -> ServiceResult<Community> {
    db::get_community_by_name(conn, name)?.ok_or_else(|| ServiceError::not_found("Community", name))
}

pub fn list_communities(conn: &Connection) -> ServiceResult<Vec<Community>> {
    Ok(db::list_communities(conn)?)
}

fn require_community(conn: &Connection, id: &Uuid) -> ServiceResult<Community> {
    db::get_community(conn, id)?.ok_or_else(|| ServiceError::not_found("Community", id))
}

/// Fail with forbidden unless `user_id` moderates the community with `permission`.
fn require_permission(
    conn: &Connection,
    community_id: &Uuid,
    user_id: &Uuid,
    permission: ModeratorPermission,
) -> ServiceResult<Moderator> {
    match db::get_moderator(conn, community_id, user_id)? {
        Some(moderator) if moderator.permissions.has(permission) => Ok(moderator),
        Some(_) => Err(ServiceError::Forbidden(format!(
            "Missing {permission:?} permission"
        ))),
        None => Err(ServiceError::Forbidden("Not a moderator of this community".into())),
    }
}

pub fn join_community(
    conn: &Connection,
    community_id: &Uuid,
    user_id: &Uuid,
) -> ServiceResult<Community> {
    require_community(conn, community_id)?;
    require_user(conn, user_id)?;

    let tx = begin_immediate(conn)?;
    if db::is_member(&tx, community_id, user_id)? {
        return Err(ServiceError::Conflict("Already a member of this community".into()));
    }
    db::insert_member(&tx, community_id, user_id, &Utc::now())?;
    db::adjust_member_count(&tx, community_id, 1)?;
    tx.commit()?;

    tracing::debug!(community_id = %community_id, user_id = %user_id, "Joined community");
    require_community(conn, community_id)
}

/// Leave a community. The last moderator cannot leave.
pub fn leave_community(
    conn: &Connection,
    community_id: &Uuid,
    user_id: &Uuid,
) -> ServiceResult<Community> {
    require_community(conn, community_id)?;

    let tx = begin_immediate(conn)?;
    if !db::is_member(&tx, community_id, user_id)? {
        return Err(ServiceError::not_found("Membership", user_id));
    }
    if db::get_moderator(&tx, community_id, user_id)?.is_some() {
        if db::count_moderators(&tx, community_id)? <= 1 {
            return Err(ServiceError::Forbidden(
                "The only moderator cannot leave the community".into(),
            ));
        }
        db::delete_moderator(&tx, community_id, user_id)?;
    }
    db::delete_member(&tx, community_id, user_id)?;
    db::adjust_member_count(&tx, community_id, -1)?;
    tx.commit()?;

    tracing::debug!(community_id = %community_id, user_id = %user_id, "Left community");
    require_community(conn, community_id)
}

pub fn update_community(
    conn: &Connection,
    community_id: &Uuid,
    user_id: &Uuid,
    update: CommunityUpdate,
) -> ServiceResult<Community> {
    require_community(conn, community_id)?;
    require_permission(conn, community_id, user_id, ModeratorPermission::Config)?;

    db::update_community_description(conn, community_id, update.description.as_deref())?;
    tracing::info!(community_id = %community_id, "Community settings updated");
    require_community(conn, community_id)
}

/// Grant (or replace) moderator permissions for an existing member.
pub fn add_moderator(
    conn: &Connection,
    community_id: &Uuid,
    actor_id: &Uuid,
    user_id: &Uuid,
    permissions: ModeratorPermissions,
) -> ServiceResult<Moderator> {
    require_community(conn, community_id)?;
    require_permission(conn, community_id, actor_id, ModeratorPermission::Access)?;
    if !db::is_member(conn, community_id, user_id)? {
        return Err(ServiceError::Validation(
            "Moderators must be members of the community".into(),
        ));
    }

    let moderator = Moderator {
        community_id: *community_id,
        user_id: *user_id,
        permissions,
        added_at: Utc::now(),
    };
    db::upsert_moderator(conn, &moderator)?;
    tracing::info!(community_id = %community_id, user_id = %user_id, "Moderator added");
    Ok(moderator)
}

pub fn remove_moderator(
    conn: &Connection,
    community_id: &Uuid,
    actor_id: &Uuid,
    user_id: &Uuid,
) -> ServiceResult<()> {
    require_community(conn, community_id)?;
    require_permission(conn, community_id, actor_id, ModeratorPermission::Access)?;

    let tx = begin_immediate(conn)?;
    if db::get_moderator(&tx, community_id, user_id)?.is_none() {
        return Err(ServiceError::not_found("Moderator", user_id));
    }
    if db::count_moderators(&tx, community_id)? <= 1 {
        return Err(ServiceError::Forbidden(
            "A community must keep at least one moderator".into(),
        ));
    }
    db::delete_moderator(&tx, community_id, user_id)?;
    tx.commit()?;

    tracing::info!(community_id = %community_id, user_id = %user_id, "Moderator removed");
    Ok(())
}
