//! Transport-agnostic contract of the message center backend.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use postbox_shared::types::{ChannelId, Credentials, MessageId};

use crate::error::RequestError;

pub const HTTP_OK: u16 = 200;
pub const HTTP_NOT_MODIFIED: u16 = 304;

/// Status, optional decoded body and optional `Last-Modified` of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub result: Option<T>,
    /// Milliseconds since epoch.
    pub last_modified: Option<i64>,
}

impl<T> ApiResponse<T> {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            result: None,
            last_modified: None,
        }
    }

    pub fn with_result(mut self, result: T) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_last_modified(mut self, millis: i64) -> Self {
        self.last_modified = Some(millis);
        self
    }

    /// 200-299
    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_ok(&self) -> bool {
        self.status == HTTP_OK
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == HTTP_NOT_MODIFIED
    }
}

#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch the full message list, conditional on `last_modified` (ms since
    /// epoch, 0 for unconditional).
    async fn fetch_messages(
        &self,
        credentials: &Credentials,
        channel_id: &ChannelId,
        last_modified: i64,
    ) -> Result<ApiResponse<Vec<Value>>, RequestError>;

    /// Create an anonymous user bound to `channel_id`.
    async fn create_user(
        &self,
        channel_id: &ChannelId,
    ) -> Result<ApiResponse<Credentials>, RequestError>;

    /// Re-associate the existing user with `channel_id`.
    async fn update_user(
        &self,
        credentials: &Credentials,
        channel_id: &ChannelId,
    ) -> Result<ApiResponse<()>, RequestError>;

    async fn sync_read_state(
        &self,
        credentials: &Credentials,
        channel_id: &ChannelId,
        ids: &HashSet<MessageId>,
    ) -> Result<ApiResponse<()>, RequestError>;

    async fn sync_deleted_state(
        &self,
        credentials: &Credentials,
        channel_id: &ChannelId,
        ids: &HashSet<MessageId>,
    ) -> Result<ApiResponse<()>, RequestError>;
}
