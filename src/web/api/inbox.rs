//! API endpoints for the inbound mailbox.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::mailbox::{InboundMessage, Mailbox, MailboxStats};

/// One message or a batch, as external integrations send either.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum InboxPayload {
    One(InboundMessage),
    Many(Vec<InboundMessage>),
}

impl InboxPayload {
    fn into_messages(self) -> Vec<InboundMessage> {
        match self {
            InboxPayload::One(message) => vec![message],
            InboxPayload::Many(messages) => messages,
        }
    }
}

#[derive(Serialize)]
pub struct PostInboxResponse {
    pub ids: Vec<String>,
}

/// Accept messages into the mailbox.
pub async fn post_inbox(
    State(mailbox): State<Mailbox>,
    Json(payload): Json<InboxPayload>,
) -> Result<(StatusCode, Json<PostInboxResponse>), StatusCode> {
    let messages = payload.into_messages();
    if messages.is_empty() || messages.iter().any(|m| m.content.trim().is_empty()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut ids = Vec::with_capacity(messages.len());
    for message in messages {
        let id = mailbox.post(message).map_err(|e| {
            tracing::error!("Failed to post to mailbox: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        ids.push(id);
    }

    Ok((StatusCode::ACCEPTED, Json(PostInboxResponse { ids })))
}

/// Mailbox counters.
pub async fn inbox_stats(State(mailbox): State<Mailbox>) -> Result<Json<MailboxStats>, StatusCode> {
    let stats = mailbox
        .stats()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(stats))
}
