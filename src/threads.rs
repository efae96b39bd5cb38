//! Symptom threads and replies.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, begin_immediate};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Reply, Thread};
use crate::users::require_user;

const MAX_TITLE_CHARS: usize = 300;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub title: String,
    pub content: String,
}

/// A thread together with its replies, oldest reply first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: Thread,
    pub replies: Vec<Reply>,
}

pub fn create_thread(conn: &Connection, new: NewThread) -> ServiceResult<Thread> {
    let title = new.title.trim();
    let title_len = title.chars().count();
    if title_len == 0 || title_len > MAX_TITLE_CHARS {
        return Err(ServiceError::Validation(format!(
            "Title must be 1-{MAX_TITLE_CHARS} characters"
        )));
    }
    if new.content.trim().is_empty() {
        return Err(ServiceError::Validation("Content must not be empty".into()));
    }
    require_user(conn, &new.author_id)?;

    if let Some(community_id) = &new.community_id {
        if db::get_community(conn, community_id)?.is_none() {
            return Err(ServiceError::not_found("Community", community_id));
        }
        if !db::is_member(conn, community_id, &new.author_id)? {
            return Err(ServiceError::Forbidden(
                "Only members can post in this community".into(),
            ));
        }
    }

    let thread = Thread {
        id: Uuid::new_v4(),
        community_id: new.community_id,
        author_id: new.author_id,
        title: title.to_string(),
        content: new.content,
        score: 0,
        reply_count: 0,
        created_at: Utc::now(),
    };
    db::insert_thread(conn, &thread)?;

    tracing::info!(thread_id = %thread.id, author_id = %thread.author_id, "Thread created");
    Ok(thread)
}

pub fn list_threads(conn: &Connection, community_id: Option<&Uuid>) -> ServiceResult<Vec<Thread>> {
    Ok(db::list_threads(conn, community_id)?)
}

pub(crate) fn require_thread(conn: &Connection, id: &Uuid) -> ServiceResult<Thread> {
    db::get_thread(conn, id)?.ok_or_else(|| ServiceError::not_found("Thread", id))
}

pub fn get_thread(conn: &Connection, id: &Uuid) -> ServiceResult<ThreadDetail> {
    let thread = require_thread(conn, id)?;
    let replies = db::list_replies(conn, id)?;
    Ok(ThreadDetail { thread, replies })
}

/// Reply to a thread. Replies from verified doctors are flagged.
pub fn reply_to_thread(
    conn: &Connection,
    thread_id: &Uuid,
    author_id: &Uuid,
    content: &str,
) -> ServiceResult<Reply> {
    if content.trim().is_empty() {
        return Err(ServiceError::Validation("Content must not be empty".into()));
    }
    require_thread(conn, thread_id)?;
    let author = require_user(conn, author_id)?;

    let reply = Reply {
        id: Uuid::new_v4(),
        thread_id: *thread_id,
        author_id: *author_id,
        content: content.to_string(),
        is_doctor_reply: author.is_verified_doctor(),
        created_at: Utc::now(),
    };
    let tx = begin_immediate(conn)?;
    db::insert_reply(&tx, &reply)?;
    tx.commit()?;

    tracing::debug!(
        thread_id = %thread_id,
        doctor_reply = reply.is_doctor_reply,
        "Reply added"
    );
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::{create_community, NewCommunity};
    use crate::db::repository::test_support::make_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserRole;

    fn new_thread(author_id: Uuid, community_id: Option<Uuid>, title: &str) -> NewThread {
        NewThread {
            author_id,
            community_id,
            title: title.into(),
            content: "Persistent headache after waking up".into(),
        }
    }

    #[test]
    fn create_and_fetch_thread() {
        let conn = open_memory_database().unwrap();
        let author = make_user(&conn, "sufferer", UserRole::Patient);
        let thread = create_thread(&conn, new_thread(author.id, None, "  Morning headaches  ")).unwrap();
        assert_eq!(thread.title, "Morning headaches");

        let detail = get_thread(&conn, &thread.id).unwrap();
        assert_eq!(detail.thread.id, thread.id);
        assert!(detail.replies.is_empty());
    }

    #[test]
    fn title_length_is_validated() {
        let conn = open_memory_database().unwrap();
        let author = make_user(&conn, "sufferer", UserRole::Patient);
        for title in ["", "   ", &"t".repeat(301)] {
            let err = create_thread(&conn, new_thread(author.id, None, title)).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(create_thread(&conn, new_thread(author.id, None, &"t".repeat(300))).is_ok());
    }

    #[test]
    fn posting_in_community_requires_membership() {
        let conn = open_memory_database().unwrap();
        let founder = make_user(&conn, "founder", UserRole::Patient);
        let outsider = make_user(&conn, "outsider", UserRole::Patient);
        let community = create_community(
            &conn,
            NewCommunity {
                name: "back_pain".into(),
                description: None,
                creator_id: founder.id,
            },
        )
        .unwrap();

        let err = create_thread(&conn, new_thread(outsider.id, Some(community.id), "Hi"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let thread = create_thread(&conn, new_thread(founder.id, Some(community.id), "Hi")).unwrap();
        let listed = list_threads(&conn, Some(&community.id)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, thread.id);
    }

    #[test]
    fn verified_doctor_replies_are_flagged() {
        let conn = open_memory_database().unwrap();
        let author = make_user(&conn, "sufferer", UserRole::Patient);
        let doctor = make_user(&conn, "drhouse", UserRole::Doctor);
        let unverified = make_user(&conn, "drnobody", UserRole::Doctor);
        db::set_user_verified(&conn, &doctor.id, true).unwrap();
        let thread = create_thread(&conn, new_thread(author.id, None, "Rash")).unwrap();

        let from_doctor = reply_to_thread(&conn, &thread.id, &doctor.id, "See a dermatologist").unwrap();
        let from_unverified = reply_to_thread(&conn, &thread.id, &unverified.id, "Try cream").unwrap();
        let from_patient = reply_to_thread(&conn, &thread.id, &author.id, "Thanks").unwrap();
        assert!(from_doctor.is_doctor_reply);
        assert!(!from_unverified.is_doctor_reply);
        assert!(!from_patient.is_doctor_reply);

        let detail = get_thread(&conn, &thread.id).unwrap();
        assert_eq!(detail.thread.reply_count, 3);
        assert_eq!(detail.replies[0].id, from_doctor.id);
    }

    #[test]
    fn reply_to_missing_thread_not_found() {
        let conn = open_memory_database().unwrap();
        let author = make_user(&conn, "sufferer", UserRole::Patient);
        let err = reply_to_thread(&conn, &Uuid::new_v4(), &author.id, "hello").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "Thread", .. }));
    }

    #[test]
    fn detail_serializes_flat() {
        let conn = open_memory_database().unwrap();
        let author = make_user(&conn, "sufferer", UserRole::Patient);
        let thread = create_thread(&conn, new_thread(author.id, None, "Flat")).unwrap();
        let json = serde_json::to_value(get_thread(&conn, &thread.id).unwrap()).unwrap();
        assert_eq!(json["title"], "Flat");
        assert_eq!(json["replyCount"], 0);
        assert!(json["replies"].as_array().unwrap().is_empty());
    }
}
