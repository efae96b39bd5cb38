use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid, to_db_timestamp};
use crate::db::DatabaseError;
use crate::models::{Reply, Thread};

const THREAD_COLUMNS: &str =
    "id, community_id, author_id, title, content, score, reply_count, created_at";

pub fn insert_thread(conn: &Connection, thread: &Thread) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO threads (id, community_id, author_id, title, content, score, reply_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            thread.id.to_string(),
            thread.community_id.map(|id| id.to_string()),
            thread.author_id.to_string(),
            thread.title,
            thread.content,
            thread.score,
            thread.reply_count,
            to_db_timestamp(&thread.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_thread(conn: &Connection, id: &Uuid) -> Result<Option<Thread>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1"),
            params![id.to_string()],
            read_thread_row,
        )
        .optional()?;
    row.map(thread_from_row).transpose()
}

/// Newest first. `None` lists every thread.
pub fn list_threads(
    conn: &Connection,
    community_id: Option<&Uuid>,
) -> Result<Vec<Thread>, DatabaseError> {
    let mut threads = Vec::new();
    match community_id {
        Some(id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {THREAD_COLUMNS} FROM threads WHERE community_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map(params![id.to_string()], read_thread_row)?;
            for row in rows {
                threads.push(thread_from_row(row?)?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {THREAD_COLUMNS} FROM threads ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map([], read_thread_row)?;
            for row in rows {
                threads.push(thread_from_row(row?)?);
            }
        }
    }
    Ok(threads)
}

pub fn adjust_thread_score(conn: &Connection, id: &Uuid, delta: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE threads SET score = score + ?2 WHERE id = ?1",
        params![id.to_string(), delta],
    )?;
    Ok(())
}

pub fn insert_reply(conn: &Connection, reply: &Reply) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO thread_replies (id, thread_id, author_id, content, is_doctor_reply, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            reply.id.to_string(),
            reply.thread_id.to_string(),
            reply.author_id.to_string(),
            reply.content,
            reply.is_doctor_reply,
            to_db_timestamp(&reply.created_at),
        ],
    )?;
    conn.execute(
        "UPDATE threads SET reply_count = reply_count + 1 WHERE id = ?1",
        params![reply.thread_id.to_string()],
    )?;
    Ok(())
}

/// Oldest first, the order a discussion is read in.
pub fn list_replies(conn: &Connection, thread_id: &Uuid) -> Result<Vec<Reply>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, thread_id, author_id, content, is_doctor_reply, created_at
         FROM thread_replies WHERE thread_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![thread_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, bool>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut replies = Vec::new();
    for row in rows {
        let (id, thread_id, author_id, content, is_doctor_reply, created_at) = row?;
        replies.push(Reply {
            id: parse_uuid("thread_replies.id", &id)?,
            thread_id: parse_uuid("thread_replies.thread_id", &thread_id)?,
            author_id: parse_uuid("thread_replies.author_id", &author_id)?,
            content,
            is_doctor_reply,
            created_at: parse_timestamp("thread_replies.created_at", &created_at)?,
        });
    }
    Ok(replies)
}

/// Current vote of a user on a thread; 0 when the user never voted.
pub fn get_vote(conn: &Connection, thread_id: &Uuid, user_id: &Uuid) -> Result<i64, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM thread_votes WHERE thread_id = ?1 AND user_id = ?2",
            params![thread_id.to_string(), user_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(0))
}

pub fn upsert_vote(
    conn: &Connection,
    thread_id: &Uuid,
    user_id: &Uuid,
    value: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO thread_votes (thread_id, user_id, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(thread_id, user_id) DO UPDATE SET value = excluded.value",
        params![thread_id.to_string(), user_id.to_string(), value],
    )?;
    Ok(())
}

struct ThreadRow {
    id: String,
    community_id: Option<String>,
    author_id: String,
    title: String,
    content: String,
    score: i64,
    reply_count: i64,
    created_at: String,
}

fn read_thread_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadRow> {
    Ok(ThreadRow {
        id: row.get(0)?,
        community_id: row.get(1)?,
        author_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        score: row.get(5)?,
        reply_count: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn thread_from_row(row: ThreadRow) -> Result<Thread, DatabaseError> {
    Ok(Thread {
        id: parse_uuid("threads.id", &row.id)?,
        community_id: row
            .community_id
            .as_deref()
            .map(|id| parse_uuid("threads.community_id", id))
            .transpose()?,
        author_id: parse_uuid("threads.author_id", &row.author_id)?,
        title: row.title,
        content: row.content,
        score: row.score,
        reply_count: row.reply_count,
        created_at: parse_timestamp("threads.created_at", &row.created_at)?,
    })
}
