//! In-memory backend and engine wiring shared by the unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::watch;

use postbox_shared::types::{ChannelId, Credentials, MessageId};
use postbox_store::{Database, SharedDatabase, UserRecord};

use crate::api::{ApiResponse, RemoteApi};
use crate::clock::ManualClock;
use crate::engine::SyncEngine;
use crate::error::RequestError;
use crate::events::EventBus;
use crate::user::User;

/// Scripted server.  Statuses default to success.
pub struct FakeState {
    pub messages: Vec<Value>,
    pub last_modified: i64,
    pub fetch_status: u16,
    pub create_status: u16,
    pub update_status: u16,
    pub read_status: u16,
    pub delete_status: u16,
    /// Every call fails as if the network were down.
    pub offline: bool,
    pub issued: Credentials,
    pub fetch_cursors: Vec<i64>,
    pub create_calls: usize,
    pub update_calls: usize,
    pub read_pushes: Vec<HashSet<MessageId>>,
    pub delete_pushes: Vec<HashSet<MessageId>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            last_modified: 0,
            fetch_status: 200,
            create_status: 201,
            update_status: 200,
            read_status: 200,
            delete_status: 200,
            offline: false,
            issued: credentials(),
            fetch_cursors: Vec::new(),
            create_calls: 0,
            update_calls: 0,
            read_pushes: Vec::new(),
            delete_pushes: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    fn offline_error() -> RequestError {
        RequestError::Decode("connection reset".into())
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn fetch_messages(
        &self,
        _credentials: &Credentials,
        _channel_id: &ChannelId,
        last_modified: i64,
    ) -> Result<ApiResponse<Vec<Value>>, RequestError> {
        self.with(|s| {
            s.fetch_cursors.push(last_modified);
            if s.offline {
                return Err(Self::offline_error());
            }
            let mut response = ApiResponse::new(s.fetch_status).with_last_modified(s.last_modified);
            if response.is_successful() {
                response.result = Some(s.messages.clone());
            }
            Ok(response)
        })
    }

    async fn create_user(
        &self,
        _channel_id: &ChannelId,
    ) -> Result<ApiResponse<Credentials>, RequestError> {
        self.with(|s| {
            s.create_calls += 1;
            if s.offline {
                return Err(Self::offline_error());
            }
            let mut response = ApiResponse::new(s.create_status);
            if response.is_successful() {
                response.result = Some(s.issued.clone());
            }
            Ok(response)
        })
    }

    async fn update_user(
        &self,
        _credentials: &Credentials,
        _channel_id: &ChannelId,
    ) -> Result<ApiResponse<()>, RequestError> {
        self.with(|s| {
            s.update_calls += 1;
            if s.offline {
                return Err(Self::offline_error());
            }
            Ok(ApiResponse::new(s.update_status))
        })
    }

    async fn sync_read_state(
        &self,
        _credentials: &Credentials,
        _channel_id: &ChannelId,
        ids: &HashSet<MessageId>,
    ) -> Result<ApiResponse<()>, RequestError> {
        self.with(|s| {
            s.read_pushes.push(ids.clone());
            if s.offline {
                return Err(Self::offline_error());
            }
            Ok(ApiResponse::new(s.read_status))
        })
    }

    async fn sync_deleted_state(
        &self,
        _credentials: &Credentials,
        _channel_id: &ChannelId,
        ids: &HashSet<MessageId>,
    ) -> Result<ApiResponse<()>, RequestError> {
        self.with(|s| {
            s.delete_pushes.push(ids.clone());
            if s.offline {
                return Err(Self::offline_error());
            }
            Ok(ApiResponse::new(s.delete_status))
        })
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "user-1".into(),
        password: "secret".into(),
    }
}

pub fn message(id: &str) -> Value {
    json!({ "message_id": id, "title": id, "unread": true })
}

pub fn ids(list: &[&str]) -> HashSet<MessageId> {
    list.iter().map(|id| MessageId::from(*id)).collect()
}

/// Engine wired to a [`FakeApi`], an in-memory store and a manual clock.
pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub api: Arc<FakeApi>,
    pub store: SharedDatabase,
    pub clock: ManualClock,
    pub events: EventBus,
    pub channel: watch::Sender<Option<ChannelId>>,
}

/// Start of the manual clock: 2024-01-01T00:00:00Z.
pub const START_MILLIS: i64 = 1_704_067_200_000;

impl Harness {
    pub fn new() -> Self {
        let store = Database::open_in_memory().unwrap().into_shared();
        let api = Arc::new(FakeApi::default());
        let clock = ManualClock::new(START_MILLIS);
        let events = EventBus::default();
        let (channel, channel_rx) = watch::channel(ChannelId::parse("channel-1"));
        let user = User::new(store.clone(), events.clone());

        let engine = SyncEngine::new(
            store.clone(),
            api.clone(),
            user,
            Arc::new(channel_rx),
            Arc::new(clock.clone()),
            events.clone(),
        );

        Self {
            engine: Arc::new(engine),
            api,
            store,
            clock,
            events,
            channel,
        }
    }

    /// Seed an already-created user without going through the engine.
    pub fn with_user(self) -> Self {
        let record = UserRecord {
            credentials: credentials(),
            registered_channel_id: Some("channel-1".into()),
            created_at: chrono::Utc::now(),
        };
        self.store.with(|db| db.save_user(&record)).unwrap();
        self
    }

    pub fn without_channel(self) -> Self {
        self.channel.send_replace(None);
        self
    }

    pub fn stored_ids(&self) -> HashSet<MessageId> {
        self.store.with(|db| db.message_ids()).unwrap()
    }

    pub fn pref(&self, key: &str) -> i64 {
        self.store.with(|db| db.get_i64(key, 0)).unwrap()
    }
}
