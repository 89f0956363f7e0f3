use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use parley_db::models::MessageRow;
use parley_types::api::{Claims, MessageResponse, SendMessageRequest};

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `created_at` timestamp of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

/// The receiver is not checked for existence: persistence is the only
/// acknowledgment, matching the original exchange contract.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ciphertext = B64.decode(&req.ciphertext).map_err(|_| ApiError::Validation)?;
    let nonce = B64.decode(&req.nonce).map_err(|_| ApiError::Validation)?;

    let message_id = Uuid::new_v4();
    let now = Utc::now();
    let created_at = now.to_rfc3339_opts(SecondsFormat::Micros, true);

    // Run blocking DB insert off the async runtime
    let db = state.clone();
    let mid = message_id.to_string();
    let sender = claims.sub.to_string();
    let receiver = req.receiver_id.to_string();
    tokio::task::spawn_blocking(move || {
        db.db
            .insert_message(&mid, &sender, &receiver, &ciphertext, &nonce, &created_at)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {e}")))??;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            sender_id: claims.sub,
            receiver_id: req.receiver_id,
            ciphertext: req.ciphertext,
            nonce: req.nonce,
            created_at: now,
        }),
    ))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let me = claims.sub.to_string();
    let other = user_id.to_string();
    let limit = query.limit.min(200);
    let before = query.before;

    let mut rows = tokio::task::spawn_blocking(move || {
        db.db.get_conversation(&me, &other, limit, before.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {e}")))??;

    // The store hands back the newest-first page; the API contract is
    // ascending by creation time.
    rows.reverse();

    let messages: Vec<MessageResponse> = rows.into_iter().map(row_to_response).collect();

    Ok(Json(messages))
}

fn row_to_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: parse_uuid(&row.id, "message id"),
        sender_id: parse_uuid(&row.sender_id, "sender_id"),
        receiver_id: parse_uuid(&row.receiver_id, "receiver_id"),
        ciphertext: B64.encode(&row.ciphertext),
        nonce: B64.encode(&row.nonce),
        created_at: parse_timestamp(&row.created_at, &row.id),
    }
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, value, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(value: &str, context: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite default timestamps are "YYYY-MM-DD HH:MM:SS" without a
            // timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on '{}': {}", value, context, e);
            DateTime::default()
        })
}
