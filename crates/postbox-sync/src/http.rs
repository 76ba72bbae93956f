//! reqwest implementation of [`RemoteApi`].
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Call | Request |
//! |---|---|
//! | fetch messages | `GET  /api/user/{username}/messages/` |
//! | create user | `POST /api/user/` |
//! | update user | `POST /api/user/{username}/` |
//! | read state | `POST /api/user/{username}/messages/unread/` |
//! | delete state | `POST /api/user/{username}/messages/delete/` |

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{ACCEPT, IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;

use postbox_shared::constants::{API_ACCEPT_HEADER, CHANNEL_ID_HEADER};
use postbox_shared::types::{ChannelId, Credentials, MessageId};

use crate::api::{ApiResponse, RemoteApi};
use crate::config::SyncConfig;
use crate::error::RequestError;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Deserialize)]
struct MessageListBody {
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CreateUserBody {
    user_id: String,
    password: String,
}

pub struct HttpRemoteApi {
    client: Client,
    base_url: String,
    app_auth: Option<(String, String)>,
}

impl HttpRemoteApi {
    pub fn new(config: &SyncConfig) -> Result<Self, RequestError> {
        let base_url = config.api_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RequestError::InvalidUrl(config.api_url.clone()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("postbox/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let app_auth = match (&config.app_key, &config.app_secret) {
            (Some(key), Some(secret)) => Some((key.clone(), secret.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url,
            app_auth,
        })
    }

    fn user_url(&self, username: &str, suffix: &str) -> String {
        format!("{}/api/user/{}/{}", self.base_url, username, suffix)
    }

    fn authed(
        &self,
        builder: RequestBuilder,
        credentials: &Credentials,
        channel_id: &ChannelId,
    ) -> RequestBuilder {
        builder
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header(ACCEPT, API_ACCEPT_HEADER)
            .header(CHANNEL_ID_HEADER, channel_id.as_str())
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<ApiResponse<()>, RequestError> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        trace!(status, url = %response.url(), "response received");
        Ok(ApiResponse::new(status))
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn fetch_messages(
        &self,
        credentials: &Credentials,
        channel_id: &ChannelId,
        last_modified: i64,
    ) -> Result<ApiResponse<Vec<Value>>, RequestError> {
        let url = self.user_url(&credentials.username, "messages/");
        let mut builder = self.authed(self.client.get(&url), credentials, channel_id);
        if last_modified > 0 {
            if let Some(date) = format_http_date(last_modified) {
                builder = builder.header(IF_MODIFIED_SINCE, date);
            }
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let header_time = last_modified_millis(&response);
        trace!(status, last_modified = ?header_time, "fetch messages response");

        let mut api_response = ApiResponse::new(status);
        api_response.last_modified = header_time;

        if response.status().is_success() {
            let body: MessageListBody = response
                .json()
                .await
                .map_err(|e| RequestError::Decode(e.to_string()))?;
            api_response.result = Some(body.messages);
        }

        Ok(api_response)
    }

    async fn create_user(
        &self,
        channel_id: &ChannelId,
    ) -> Result<ApiResponse<Credentials>, RequestError> {
        let url = format!("{}/api/user/", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header(ACCEPT, API_ACCEPT_HEADER)
            .json(&json!({ "android_channels": [channel_id.as_str()] }));
        if let Some((key, secret)) = &self.app_auth {
            builder = builder.basic_auth(key, Some(secret));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        trace!(status, "create user response");

        let mut api_response = ApiResponse::new(status);
        if response.status().is_success() {
            let body: CreateUserBody = response
                .json()
                .await
                .map_err(|e| RequestError::Decode(e.to_string()))?;
            api_response.result = Some(Credentials {
                username: body.user_id,
                password: body.password,
            });
        }

        Ok(api_response)
    }

    async fn update_user(
        &self,
        credentials: &Credentials,
        channel_id: &ChannelId,
    ) -> Result<ApiResponse<()>, RequestError> {
        let url = self.user_url(&credentials.username, "");
        let builder = self
            .authed(self.client.post(&url), credentials, channel_id)
            .json(&json!({ "android_channels": { "add": [channel_id.as_str()] } }));
        self.send_empty(builder).await
    }

    async fn sync_read_state(
        &self,
        credentials: &Credentials,
        channel_id: &ChannelId,
        ids: &HashSet<MessageId>,
    ) -> Result<ApiResponse<()>, RequestError> {
        let url = self.user_url(&credentials.username, "messages/unread/");
        let builder = self
            .authed(self.client.post(&url), credentials, channel_id)
            .json(&json!({ "mark_as_read": sorted(ids) }));
        self.send_empty(builder).await
    }

    async fn sync_deleted_state(
        &self,
        credentials: &Credentials,
        channel_id: &ChannelId,
        ids: &HashSet<MessageId>,
    ) -> Result<ApiResponse<()>, RequestError> {
        let url = self.user_url(&credentials.username, "messages/delete/");
        let builder = self
            .authed(self.client.post(&url), credentials, channel_id)
            .json(&json!({ "delete": sorted(ids) }));
        self.send_empty(builder).await
    }
}

// Stable order keeps request bodies reproducible.
fn sorted(ids: &HashSet<MessageId>) -> Vec<&str> {
    let mut list: Vec<&str> = ids.iter().map(MessageId::as_str).collect();
    list.sort_unstable();
    list
}

fn format_http_date(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format(HTTP_DATE_FORMAT).to_string())
}

fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn last_modified_millis(response: &Response) -> Option<i64> {
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
}
