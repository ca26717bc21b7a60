use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, warn};
use uuid::Uuid;

use solace_types::api::{Claims, ConversationQuery, MessageView, SendMessageRequest};
use solace_types::events::{ChangeEvent, ChangeKind, Record};
use solace_types::models::UserSummary;

use crate::error::ApiError;
use crate::{AppState, blocking, validate_content};

/// Everyone the caller could start a conversation with.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = blocking(&state, move |db| db.list_users_except(claims.sub)).await?;
    Ok(Json(users))
}

/// Two-party conversation between the caller and `with`, oldest first.
/// Messages with anyone else are never included.
pub async fn get_conversation(
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let me = claims.sub;
    let messages = blocking(&state, move |db| db.conversation(me, query.with)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate_content(&req.content)?;
    if req.receiver_id == claims.sub {
        return Err(ApiError::BadRequest("Cannot send a message to yourself".into()));
    }

    let sender_id = claims.sub;
    let receiver_id = req.receiver_id;
    let message = blocking(&state, move |db| {
        if db.get_user(receiver_id)?.is_none() {
            return Ok(None);
        }
        db.insert_message(Uuid::new_v4(), sender_id, receiver_id, &content).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Receiver"))?;

    debug!("{} -> {} message {}", sender_id, receiver_id, message.id);
    state
        .dispatcher
        .publish(ChangeEvent::new(ChangeKind::Insert, Record::Message(message.clone())));

    Ok((StatusCode::CREATED, Json(message)))
}

/// Receiver-only.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageView>, ApiError> {
    let existing = blocking(&state, move |db| db.get_message(message_id))
        .await?
        .ok_or(ApiError::NotFound("Message"))?;

    if existing.receiver_id != claims.sub {
        warn!("{} attempted to mark message {} read", claims.sub, message_id);
        return Err(ApiError::Forbidden("Only the receiver can mark a message read"));
    }
    if existing.read {
        return Ok(Json(existing));
    }

    let message = blocking(&state, move |db| db.mark_message_read(message_id))
        .await?
        .ok_or(ApiError::NotFound("Message"))?;

    state
        .dispatcher
        .publish(ChangeEvent::new(ChangeKind::Update, Record::Message(message.clone())));

    Ok(Json(message))
}
