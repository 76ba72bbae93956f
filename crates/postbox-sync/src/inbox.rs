//! Read path and job submission for a UI.
//!
//! Local mutations land in the store immediately; pushing them to the server
//! is queued on the dispatcher and happens in the background.

use std::collections::HashSet;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use postbox_shared::jobs::SyncAction;
use postbox_shared::types::MessageId;
use postbox_store::{InboxMessage, SharedDatabase, StoreError};

use crate::dispatcher::DispatcherHandle;
use crate::engine::SyncOutcome;
use crate::error::SyncError;
use crate::events::{EventBus, InboxEvent};

#[derive(Clone)]
pub struct Inbox {
    store: SharedDatabase,
    dispatcher: DispatcherHandle,
    events: EventBus,
}

impl Inbox {
    pub fn new(store: SharedDatabase, dispatcher: DispatcherHandle, events: EventBus) -> Self {
        Self {
            store,
            dispatcher,
            events,
        }
    }

    /// Visible messages, newest first.
    pub fn messages(&self) -> Result<Vec<InboxMessage>, SyncError> {
        Ok(self.store.with(|db| db.list_messages(Utc::now()))?)
    }

    /// `None` if the message is unknown, deleted locally or expired.
    pub fn message(&self, id: &MessageId) -> Result<Option<InboxMessage>, SyncError> {
        match self.store.with(|db| db.get_message(id)) {
            Ok(message) if message.deleted || message.is_expired(Utc::now()) => Ok(None),
            Ok(message) => Ok(Some(message)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn unread_count(&self) -> Result<usize, SyncError> {
        Ok(self.store.with(|db| db.count_unread(Utc::now()))?)
    }

    pub fn read_count(&self) -> Result<usize, SyncError> {
        let messages = self.messages()?;
        Ok(messages.iter().filter(|m| m.is_read()).count())
    }

    pub async fn mark_messages_read(&self, ids: &HashSet<MessageId>) -> Result<(), SyncError> {
        let changed = self.store.with(|db| db.mark_messages_read(ids))?;
        debug!(changed, "messages marked read");
        self.dispatcher.enqueue(SyncAction::SyncState).await
    }

    /// Local only: the server has no "mark unread" call.
    pub fn mark_messages_unread(&self, ids: &HashSet<MessageId>) -> Result<(), SyncError> {
        let changed = self.store.with(|db| db.mark_messages_unread(ids))?;
        debug!(changed, "messages marked unread");
        Ok(())
    }

    pub async fn delete_messages(&self, ids: &HashSet<MessageId>) -> Result<(), SyncError> {
        let changed = self.store.with(|db| db.mark_messages_deleted(ids))?;
        debug!(changed, "messages marked deleted");
        self.dispatcher.enqueue(SyncAction::SyncState).await
    }

    /// Refresh from the server and wait for the result.
    pub async fn fetch_messages(&self) -> Result<SyncOutcome, SyncError> {
        self.dispatcher.submit(SyncAction::UpdateMessages).await
    }

    pub async fn update_user(&self, forcefully: bool) -> Result<SyncOutcome, SyncError> {
        self.dispatcher
            .submit(SyncAction::UpdateUser { forcefully })
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboxEvent> {
        self.events.subscribe()
    }
}
