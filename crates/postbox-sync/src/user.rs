//! The anonymous inbox user.
//!
//! Credentials live in the store; this type owns the lifecycle transitions
//! and tells observers how each create/update attempt went.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use postbox_shared::types::{ChannelId, Credentials};
use postbox_store::{Result, SharedDatabase, UserRecord};

use crate::events::{EventBus, InboxEvent};

#[derive(Clone)]
pub struct User {
    store: SharedDatabase,
    events: EventBus,
}

impl User {
    pub fn new(store: SharedDatabase, events: EventBus) -> Self {
        Self { store, events }
    }

    /// `true` once the server has issued credentials.  Never goes back.
    pub fn is_created(&self) -> Result<bool> {
        Ok(self.store.with(|db| db.load_user())?.is_some())
    }

    pub fn credentials(&self) -> Result<Option<Credentials>> {
        Ok(self
            .store
            .with(|db| db.load_user())?
            .map(|record| record.credentials))
    }

    pub fn record(&self) -> Result<Option<UserRecord>> {
        self.store.with(|db| db.load_user())
    }

    /// Persist credentials issued by a create call.
    pub fn on_created(
        &self,
        credentials: Credentials,
        channel_id: &ChannelId,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let record = UserRecord {
            credentials,
            registered_channel_id: Some(channel_id.as_str().to_string()),
            created_at,
        };
        self.store.with(|db| db.save_user(&record))?;
        info!(username = %record.credentials.username, "inbox user created");
        Ok(())
    }

    /// Record the channel accepted by a successful update call.
    pub fn on_updated(&self, channel_id: &ChannelId) -> Result<()> {
        self.store
            .with(|db| db.set_user_channel(channel_id.as_str()))?;
        debug!(channel = %channel_id, "inbox user channel recorded");
        Ok(())
    }

    /// Notify observers of a finished create/update attempt.
    pub fn on_user_updated(&self, success: bool) {
        self.events.emit(InboxEvent::UserUpdated { success });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbox_store::Database;

    fn user() -> (User, EventBus) {
        let events = EventBus::default();
        let store = Database::open_in_memory().unwrap().into_shared();
        (User::new(store, events.clone()), events)
    }

    #[test]
    fn created_after_on_created() {
        let (user, _) = user();
        assert!(!user.is_created().unwrap());
        assert!(user.credentials().unwrap().is_none());

        let creds = Credentials {
            username: "u".into(),
            password: "p".into(),
        };
        let created_at = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        user.on_created(creds.clone(), &ChannelId("c1".into()), created_at)
            .unwrap();

        assert!(user.is_created().unwrap());
        assert_eq!(user.credentials().unwrap(), Some(creds));
        let record = user.record().unwrap().unwrap();
        assert_eq!(record.registered_channel_id.as_deref(), Some("c1"));
        assert_eq!(record.created_at, created_at);

        user.on_updated(&ChannelId("c2".into())).unwrap();
        let record = user.record().unwrap().unwrap();
        assert_eq!(record.registered_channel_id.as_deref(), Some("c2"));
        assert!(user.is_created().unwrap());
    }

    #[tokio::test]
    async fn on_user_updated_notifies() {
        let (user, events) = user();
        let mut rx = events.subscribe();
        user.on_user_updated(false);
        assert_eq!(
            rx.recv().await.unwrap(),
            InboxEvent::UserUpdated { success: false }
        );
    }
}
