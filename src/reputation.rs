//! Thread voting. A vote moves the thread score and the author's karma by
//! the same delta.

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, begin_immediate};
use crate::error::{ServiceError, ServiceResult};
use crate::threads::require_thread;
use crate::users::require_user;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub thread_id: Uuid,
    pub value: i64,
    pub score: i64,
}

/// Cast, change or clear (`0`) a vote on a thread.
pub fn vote_thread(
    conn: &Connection,
    thread_id: &Uuid,
    user_id: &Uuid,
    value: i64,
) -> ServiceResult<VoteOutcome> {
    if !(-1..=1).contains(&value) {
        return Err(ServiceError::Validation("Vote must be -1, 0 or 1".into()));
    }
    require_user(conn, user_id)?;

    let tx = begin_immediate(conn)?;
    let thread = require_thread(&tx, thread_id)?;
    if thread.author_id == *user_id {
        return Err(ServiceError::Forbidden("Cannot vote on your own thread".into()));
    }

    let previous = db::get_vote(&tx, thread_id, user_id)?;
    let delta = value - previous;
    if delta != 0 {
        db::upsert_vote(&tx, thread_id, user_id, value)?;
        db::adjust_thread_score(&tx, thread_id, delta)?;
        db::adjust_karma(&tx, &thread.author_id, delta)?;
    }
    tx.commit()?;

    tracing::debug!(thread_id = %thread_id, delta, "Vote recorded");
    Ok(VoteOutcome {
        thread_id: *thread_id,
        value,
        score: thread.score + delta,
    })
}
