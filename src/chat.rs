//! Persisted patient/doctor conversations.
//!
//! The websocket relay only forwards frames; clients save each message
//! through this module so history survives reconnects. A message without a
//! conversation id finds or creates the direct conversation between sender
//! and recipient.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, begin_immediate};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Conversation, Message};
use crate::users::require_user;

const MAX_MESSAGE_CHARS: usize = 5000;
const PREVIEW_CHARS: usize = 50;

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

/// Conversation row for a user's inbox.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub participants: Vec<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub last_message_at: String,
    pub message_count: i64,
    pub last_message_preview: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub sender_id: Uuid,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub recipient_id: Option<Uuid>,
    pub content: String,
}

// ═══════════════════════════════════════════
// Preview
// ═══════════════════════════════════════════

/// First 50 characters of a message, with "..." when cut.
pub fn preview(content: &str) -> String {
    let trimmed = content.trim();
    let boundary = trimmed
        .char_indices()
        .nth(PREVIEW_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());

    if boundary >= trimmed.len() {
        trimmed.to_string()
    } else {
        format!("{}...", &trimmed[..boundary])
    }
}

// ═══════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════

/// Conversations of a user, most recently active first.
pub fn list_conversations(conn: &Connection, user_id: &Uuid) -> ServiceResult<Vec<ConversationSummary>> {
    let conversations = db::list_conversations_for_user(conn, user_id)?;
    let mut summaries = Vec::with_capacity(conversations.len());
    for conv in conversations {
        let last = db::get_last_message(conn, &conv.id)?;
        summaries.push(ConversationSummary {
            id: conv.id,
            participants: conv.participants,
            appointment_id: conv.appointment_id,
            last_message_at: db::to_db_timestamp(&conv.updated_at),
            message_count: db::count_messages(conn, &conv.id)?,
            last_message_preview: last.map(|m| preview(&m.content)).unwrap_or_default(),
        });
    }
    Ok(summaries)
}

/// Messages of a conversation in the order they were sent.
pub fn get_history(conn: &Connection, conversation_id: &Uuid) -> ServiceResult<Vec<Message>> {
    if db::get_conversation(conn, conversation_id)?.is_none() {
        return Err(ServiceError::not_found("Conversation", conversation_id));
    }
    Ok(db::get_messages_by_conversation(conn, conversation_id)?)
}

// ═══════════════════════════════════════════
// Sending
// ═══════════════════════════════════════════

/// Persist a message, creating the direct conversation on first contact.
pub fn send_message(conn: &Connection, outgoing: OutgoingMessage) -> ServiceResult<Message> {
    let content = outgoing.content.trim();
    if content.is_empty() || content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ServiceError::Validation(format!(
            "Message must be 1-{MAX_MESSAGE_CHARS} characters"
        )));
    }
    require_user(conn, &outgoing.sender_id)?;

    let tx = begin_immediate(conn)?;
    let conversation_id = match (&outgoing.conversation_id, &outgoing.recipient_id) {
        (Some(conversation_id), _) => {
            if db::get_conversation(&tx, conversation_id)?.is_none() {
                return Err(ServiceError::not_found("Conversation", conversation_id));
            }
            if !db::is_participant(&tx, conversation_id, &outgoing.sender_id)? {
                return Err(ServiceError::Forbidden(
                    "Sender is not a participant of this conversation".into(),
                ));
            }
            *conversation_id
        }
        (None, Some(recipient_id)) => {
            if *recipient_id == outgoing.sender_id {
                return Err(ServiceError::Validation("Cannot message yourself".into()));
            }
            require_user(&tx, recipient_id)?;
            find_or_create_direct(&tx, &outgoing.sender_id, recipient_id)?
        }
        (None, None) => {
            return Err(ServiceError::Validation(
                "Either conversationId or recipientId is required".into(),
            ));
        }
    };

    let message = Message {
        id: Uuid::new_v4(),
        conversation_id,
        sender_id: outgoing.sender_id,
        content: content.to_string(),
        created_at: Utc::now(),
    };
    db::insert_message(&tx, &message)?;
    tx.commit()?;

    tracing::debug!(
        conversation_id = %conversation_id,
        message_id = %message.id,
        "Message stored"
    );
    Ok(message)
}

fn find_or_create_direct(conn: &Connection, a: &Uuid, b: &Uuid) -> ServiceResult<Uuid> {
    if let Some(existing) = db::find_direct_conversation(conn, a, b)? {
        return Ok(existing.id);
    }
    let now = Utc::now();
    let conversation = Conversation {
        id: Uuid::new_v4(),
        participants: vec![*a, *b],
        appointment_id: None,
        created_at: now,
        updated_at: now,
    };
    db::insert_conversation(conn, &conversation)?;
    tracing::info!(conversation_id = %conversation.id, "Conversation created");
    Ok(conversation.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::make_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserRole;

    fn direct(sender: Uuid, recipient: Uuid, content: &str) -> OutgoingMessage {
        OutgoingMessage {
            sender_id: sender,
            conversation_id: None,
            recipient_id: Some(recipient),
            content: content.into(),
        }
    }

    #[test]
    fn preview_short_message_unchanged() {
        assert_eq!(preview("  See you Monday  "), "See you Monday");
        assert_eq!(preview(""), "");
    }

    #[test]
    fn preview_truncates_at_char_boundary() {
        let long = "é".repeat(60);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 53);
        assert_eq!(preview(&"a".repeat(50)), "a".repeat(50));
    }

    #[test]
    fn first_message_creates_conversation_then_reuses_it() {
        let conn = open_memory_database().unwrap();
        let patient = make_user(&conn, "patient", UserRole::Patient);
        let doctor = make_user(&conn, "doctor", UserRole::Doctor);

        let first = send_message(&conn, direct(patient.id, doctor.id, "Hello doctor")).unwrap();
        let reply = send_message(&conn, direct(doctor.id, patient.id, "Hello")).unwrap();
        assert_eq!(first.conversation_id, reply.conversation_id);

        let history = get_history(&conn, &first.conversation_id).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Hello doctor", "Hello"]);
    }

    #[test]
    fn inbox_summaries_include_preview_and_count() {
        let conn = open_memory_database().unwrap();
        let patient = make_user(&conn, "patient", UserRole::Patient);
        let doctor = make_user(&conn, "doctor", UserRole::Doctor);
        send_message(&conn, direct(patient.id, doctor.id, "first")).unwrap();
        send_message(&conn, direct(doctor.id, patient.id, "latest reply")).unwrap();

        let inbox = list_conversations(&conn, &patient.id).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message_count, 2);
        assert_eq!(inbox[0].last_message_preview, "latest reply");
        assert!(inbox[0].participants.contains(&doctor.id));
    }

    #[test]
    fn outsider_cannot_post_into_conversation() {
        let conn = open_memory_database().unwrap();
        let patient = make_user(&conn, "patient", UserRole::Patient);
        let doctor = make_user(&conn, "doctor", UserRole::Doctor);
        let outsider = make_user(&conn, "outsider", UserRole::Patient);
        let msg = send_message(&conn, direct(patient.id, doctor.id, "private")).unwrap();

        let err = send_message(
            &conn,
            OutgoingMessage {
                sender_id: outsider.id,
                conversation_id: Some(msg.conversation_id),
                recipient_id: None,
                content: "hi".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn invalid_messages_rejected() {
        let conn = open_memory_database().unwrap();
        let patient = make_user(&conn, "patient", UserRole::Patient);
        let doctor = make_user(&conn, "doctor", UserRole::Doctor);

        let err = send_message(&conn, direct(patient.id, doctor.id, "   ")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = send_message(&conn, direct(patient.id, patient.id, "me")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = send_message(
            &conn,
            OutgoingMessage {
                sender_id: patient.id,
                conversation_id: None,
                recipient_id: None,
                content: "lost".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = send_message(&conn, direct(patient.id, Uuid::new_v4(), "ghost")).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[test]
    fn history_of_unknown_conversation_not_found() {
        let conn = open_memory_database().unwrap();
        let err = get_history(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "Conversation", .. }));
    }
}
