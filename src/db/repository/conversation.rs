use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid, to_db_timestamp};
use crate::db::DatabaseError;
use crate::models::{Conversation, Message};

/// Insert a conversation together with its participant rows.
pub fn insert_conversation(conn: &Connection, conv: &Conversation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO conversations (id, appointment_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            conv.id.to_string(),
            conv.appointment_id.map(|id| id.to_string()),
            to_db_timestamp(&conv.created_at),
            to_db_timestamp(&conv.updated_at),
        ],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
    )?;
    for participant in &conv.participants {
        stmt.execute(params![conv.id.to_string(), participant.to_string()])?;
    }
    Ok(())
}

pub fn get_conversation(conn: &Connection, id: &Uuid) -> Result<Option<Conversation>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, appointment_id, created_at, updated_at FROM conversations WHERE id = ?1",
            params![id.to_string()],
            read_conversation_row,
        )
        .optional()?;
    match row {
        Some(row) => Ok(Some(conversation_from_row(conn, row)?)),
        None => Ok(None),
    }
}

pub fn find_conversation_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<Conversation>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, appointment_id, created_at, updated_at FROM conversations
             WHERE appointment_id = ?1 LIMIT 1",
            params![appointment_id.to_string()],
            read_conversation_row,
        )
        .optional()?;
    match row {
        Some(row) => Ok(Some(conversation_from_row(conn, row)?)),
        None => Ok(None),
    }
}

/// Find the conversation whose participant set is exactly `{a, b}`.
pub fn find_direct_conversation(
    conn: &Connection,
    a: &Uuid,
    b: &Uuid,
) -> Result<Option<Conversation>, DatabaseError> {
    let id: Option<String> = conn
        .query_row(
            "SELECT c.id FROM conversations c
             WHERE (SELECT COUNT(*) FROM conversation_participants p WHERE p.conversation_id = c.id) = 2
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = c.id AND p.user_id = ?1)
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = c.id AND p.user_id = ?2)
             ORDER BY c.updated_at DESC LIMIT 1",
            params![a.to_string(), b.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(id) => get_conversation(conn, &parse_uuid("conversations.id", &id)?),
        None => Ok(None),
    }
}

/// Conversations the user participates in, most recently active first.
pub fn list_conversations_for_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<Conversation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.appointment_id, c.created_at, c.updated_at
         FROM conversations c
         JOIN conversation_participants p ON p.conversation_id = c.id
         WHERE p.user_id = ?1
         ORDER BY c.updated_at DESC, c.rowid DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id.to_string()], read_conversation_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut conversations = Vec::with_capacity(rows.len());
    for row in rows {
        conversations.push(conversation_from_row(conn, row)?);
    }
    Ok(conversations)
}

pub fn is_participant(
    conn: &Connection,
    conversation_id: &Uuid,
    user_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM conversation_participants
                       WHERE conversation_id = ?1 AND user_id = ?2)",
        params![conversation_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Insert a message and bump the conversation's activity timestamp.
pub fn insert_message(conn: &Connection, msg: &Message) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            msg.id.to_string(),
            msg.conversation_id.to_string(),
            msg.sender_id.to_string(),
            msg.content,
            to_db_timestamp(&msg.created_at),
        ],
    )?;
    conn.execute(
        "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
        params![msg.conversation_id.to_string(), to_db_timestamp(&msg.created_at)],
    )?;
    Ok(())
}

pub fn get_messages_by_conversation(
    conn: &Connection,
    conversation_id: &Uuid,
) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, content, created_at
         FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![conversation_id.to_string()], read_message_row)?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    Ok(messages)
}

pub fn get_last_message(
    conn: &Connection,
    conversation_id: &Uuid,
) -> Result<Option<Message>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, conversation_id, sender_id, content, created_at
             FROM messages WHERE conversation_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            params![conversation_id.to_string()],
            read_message_row,
        )
        .optional()?;
    row.map(message_from_row).transpose()
}

pub fn count_messages(conn: &Connection, conversation_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
        params![conversation_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

struct ConversationRow {
    id: String,
    appointment_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn conversation_from_row(conn: &Connection, row: ConversationRow) -> Result<Conversation, DatabaseError> {
    let id = parse_uuid("conversations.id", &row.id)?;
    Ok(Conversation {
        id,
        participants: get_participants(conn, &id)?,
        appointment_id: row
            .appointment_id
            .as_deref()
            .map(|id| parse_uuid("conversations.appointment_id", id))
            .transpose()?,
        created_at: parse_timestamp("conversations.created_at", &row.created_at)?,
        updated_at: parse_timestamp("conversations.updated_at", &row.updated_at)?,
    })
}

fn get_participants(conn: &Connection, conversation_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM conversation_participants WHERE conversation_id = ?1 ORDER BY user_id",
    )?;
    let rows = stmt.query_map(params![conversation_id.to_string()], |row| row.get::<_, String>(0))?;

    let mut participants = Vec::new();
    for row in rows {
        participants.push(parse_uuid("conversation_participants.user_id", &row?)?);
    }
    Ok(participants)
}

struct MessageRow {
    id: String,
    conversation_id: String,
    sender_id: String,
    content: String,
    created_at: String,
}

fn read_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    Ok(Message {
        id: parse_uuid("messages.id", &row.id)?,
        conversation_id: parse_uuid("messages.conversation_id", &row.conversation_id)?,
        sender_id: parse_uuid("messages.sender_id", &row.sender_id)?,
        content: row.content,
        created_at: parse_timestamp("messages.created_at", &row.created_at)?,
    })
}

