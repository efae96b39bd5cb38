//! Conversation endpoints. Real-time delivery goes through `/ws`; these
//! persist and replay history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_id, require_id, ApiContext, ApiJson};
use crate::chat::{self, ConversationSummary, OutgoingMessage};
use crate::models::Message;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParams {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// `GET /api/chat/conversations?userId`
pub async fn conversations(
    State(ctx): State<ApiContext>,
    Query(params): Query<ConversationParams>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let user_id = require_id(params.user_id.as_deref(), "userId")?;
    let conn = ctx.core.open_db()?;
    let conversations = chat::list_conversations(&conn, &user_id)?;
    Ok(Json(ConversationsResponse { conversations }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

/// `GET /api/chat/conversations/:id/messages`
pub async fn history(
    State(ctx): State<ApiContext>,
    Path(conversation_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let id = parse_id(&conversation_id, "conversation id")?;
    let conn = ctx.core.open_db()?;
    let messages = chat::get_history(&conn, &id)?;
    Ok(Json(HistoryResponse {
        conversation_id: id.to_string(),
        messages,
    }))
}

/// `POST /api/chat/messages`
pub async fn send(
    State(ctx): State<ApiContext>,
    ApiJson(outgoing): ApiJson<OutgoingMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let conn = ctx.core.open_db()?;
    let message = chat::send_message(&conn, outgoing)?;
    Ok((StatusCode::CREATED, Json(message)))
}
