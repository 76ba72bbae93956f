//! Domain model structs persisted in the local inbox database.
//!
//! Every struct derives `Serialize` so it can be handed directly to a UI
//! layer.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use postbox_shared::constants::{
    MESSAGE_EXPIRY_KEY, MESSAGE_ID_KEY, MESSAGE_SENT_KEY, MESSAGE_TITLE_KEY, MESSAGE_UNREAD_KEY,
};
use postbox_shared::types::{Credentials, MessageId};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message as held in the local store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboxMessage {
    pub id: MessageId,
    pub title: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Full server payload, including fields this crate does not model.
    pub raw: Value,
    /// Local read state.
    pub unread: bool,
    /// Read state as last confirmed by the server.
    pub unread_origin: bool,
    /// Locally deleted, waiting for the server to confirm.
    pub deleted: bool,
}

impl InboxMessage {
    pub fn is_read(&self) -> bool {
        !self.unread
    }

    /// Read locally but not yet pushed.
    pub fn is_read_dirty(&self) -> bool {
        !self.unread && self.unread_origin
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

// ---------------------------------------------------------------------------
// Server payload
// ---------------------------------------------------------------------------

/// Why a server record could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no message id")]
    MissingId,
}

/// The columns extracted from one record of the server's message list.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePayload {
    pub id: MessageId,
    pub title: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub unread: bool,
    pub raw: Value,
}

impl MessagePayload {
    pub fn parse(value: &Value) -> Result<Self, PayloadError> {
        let map = value.as_object().ok_or(PayloadError::NotAnObject)?;

        let id = map
            .get(MESSAGE_ID_KEY)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(PayloadError::MissingId)?;

        Ok(Self {
            id: MessageId::from(id),
            title: map
                .get(MESSAGE_TITLE_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            sent_at: map
                .get(MESSAGE_SENT_KEY)
                .and_then(Value::as_str)
                .and_then(parse_server_date),
            expires_at: map
                .get(MESSAGE_EXPIRY_KEY)
                .and_then(Value::as_str)
                .and_then(parse_server_date),
            // Missing means unread.
            unread: map
                .get(MESSAGE_UNREAD_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(true),
            raw: value.clone(),
        })
    }
}

/// Server dates come either as RFC-3339 or as `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn parse_server_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The anonymous inbox user. At most one exists per installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub credentials: Credentials,
    /// Channel the server last accepted for this user.
    pub registered_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
