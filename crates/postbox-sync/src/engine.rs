//! Job-driven inbox synchronisation.
//!
//! One call to [`SyncEngine::run`] is one attempt at one action.  Nothing is
//! retried here: the outcome goes back to the dispatcher, which owns the
//! backoff policy.  Store and network errors are absorbed at this boundary
//! and reduced to a [`SyncOutcome`] plus a log line.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use postbox_shared::constants::{LAST_MESSAGE_REFRESH_TIME, LAST_UPDATE_TIME, USER_UPDATE_INTERVAL_MS};
use postbox_shared::jobs::{JobInfo, JobResult, SyncAction};
use postbox_shared::types::{ChannelId, Credentials};
use postbox_store::{Result as StoreResult, SharedDatabase};

use crate::api::RemoteApi;
use crate::channel::ChannelIdProvider;
use crate::clock::Clock;
use crate::events::{EventBus, InboxEvent};
use crate::reconcile::reconcile_messages;
use crate::user::User;

/// Result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Success,
    /// Transport error, rejected request or store failure.  Retry later.
    Failure,
    /// A precondition is missing (no user yet, no channel yet).  Whatever
    /// provides it will trigger the next attempt.
    NotReady,
    /// Throttled; nothing was attempted.
    Skipped,
}

impl SyncOutcome {
    pub fn is_success(self) -> bool {
        self == SyncOutcome::Success
    }

    /// Whether the dispatcher should back off and try again.
    pub fn should_retry(self) -> bool {
        self == SyncOutcome::Failure
    }
}

pub struct SyncEngine {
    store: SharedDatabase,
    api: Arc<dyn RemoteApi>,
    user: User,
    channel: Arc<dyn ChannelIdProvider>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    user_update_interval_ms: i64,
}

impl SyncEngine {
    pub fn new(
        store: SharedDatabase,
        api: Arc<dyn RemoteApi>,
        user: User,
        channel: Arc<dyn ChannelIdProvider>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            api,
            user,
            channel,
            clock,
            events,
            user_update_interval_ms: USER_UPDATE_INTERVAL_MS,
        }
    }

    pub fn with_user_update_interval(mut self, interval_ms: i64) -> Self {
        self.user_update_interval_ms = interval_ms;
        self
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Entry point for the job scheduler.  Always reports `Finished`.
    pub async fn perform(&self, job: &JobInfo) -> JobResult {
        match SyncAction::from_job(job) {
            Some(action) => {
                self.run(action).await;
            }
            None => warn!(action = %job.action, "ignoring unknown inbox job"),
        }
        JobResult::Finished
    }

    pub async fn run(&self, action: SyncAction) -> SyncOutcome {
        let outcome = match action {
            SyncAction::UpdateMessages => self.on_update_messages().await,
            SyncAction::UpdateUser { forcefully } => self.on_update_user(forcefully).await,
            SyncAction::SyncState => self.on_sync_state().await,
        };
        debug!(action = action.name(), ?outcome, "inbox job finished");
        outcome
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    async fn on_update_messages(&self) -> SyncOutcome {
        let credentials = match self.user.credentials() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                debug!("user has not been created, canceling messages update");
                self.events.emit(InboxEvent::MessagesUpdated { success: false });
                return SyncOutcome::NotReady;
            }
            Err(e) => {
                error!(error = %e, "failed to load inbox user");
                self.events.emit(InboxEvent::MessagesUpdated { success: false });
                return SyncOutcome::Failure;
            }
        };

        let outcome = self.update_messages(&credentials).await;
        self.events.emit(InboxEvent::MessagesUpdated {
            success: outcome.is_success(),
        });

        self.sync_read_message_state(&credentials).await;
        self.sync_deleted_message_state(&credentials).await;

        outcome
    }

    async fn on_sync_state(&self) -> SyncOutcome {
        match self.user.credentials() {
            Ok(Some(credentials)) => {
                self.sync_read_message_state(&credentials).await;
                self.sync_deleted_message_state(&credentials).await;
                SyncOutcome::Success
            }
            Ok(None) => {
                debug!("user has not been created, skipping message state sync");
                SyncOutcome::NotReady
            }
            Err(e) => {
                error!(error = %e, "failed to load inbox user");
                SyncOutcome::Failure
            }
        }
    }

    async fn update_messages(&self, credentials: &Credentials) -> SyncOutcome {
        info!("refreshing inbox messages");

        let Some(channel_id) = self.channel.channel_id() else {
            debug!("channel id does not exist, cannot fetch messages");
            return SyncOutcome::NotReady;
        };

        let cursor = match self.store.with(|db| db.get_i64(LAST_MESSAGE_REFRESH_TIME, 0)) {
            Ok(cursor) => cursor,
            Err(e) => {
                error!(error = %e, "failed to read message cursor");
                return SyncOutcome::Failure;
            }
        };

        debug!(cursor, "fetching inbox messages");

        let response = match self.api.fetch_messages(credentials, &channel_id, cursor).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "update messages failed");
                return SyncOutcome::Failure;
            }
        };

        if response.is_successful() {
            let Some(messages) = response.result else {
                debug!(status = response.status, "message list response had no body");
                return SyncOutcome::Failure;
            };
            info!(count = messages.len(), "received inbox messages");

            return match self.apply_message_list(&messages, cursor, response.last_modified) {
                Ok(()) => SyncOutcome::Success,
                Err(e) => {
                    error!(error = %e, "failed to store inbox messages");
                    SyncOutcome::Failure
                }
            };
        }

        if response.is_not_modified() {
            debug!("inbox messages already up-to-date");
            return SyncOutcome::Success;
        }

        debug!(status = response.status, "unable to update inbox messages");
        SyncOutcome::Failure
    }

    /// Merge, then advance the cursor.  The cursor write is the commit
    /// marker and never moves backwards.
    fn apply_message_list(
        &self,
        messages: &[serde_json::Value],
        cursor: i64,
        last_modified: Option<i64>,
    ) -> StoreResult<()> {
        reconcile_messages(&self.store, messages)?;

        match last_modified {
            Some(next) if next > cursor => {
                self.store
                    .with(|db| db.put_i64(LAST_MESSAGE_REFRESH_TIME, next))?;
            }
            Some(next) => {
                debug!(cursor, next, "server cursor did not advance, keeping current");
            }
            None => debug!("message list response had no last-modified time"),
        }
        Ok(())
    }

    async fn sync_read_message_state(&self, credentials: &Credentials) {
        let ids = match self.store.with(|db| db.read_dirty_message_ids()) {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "failed to read pending read state");
                return;
            }
        };
        if ids.is_empty() {
            return;
        }

        let Some(channel_id) = self.channel.channel_id() else {
            debug!("channel id does not exist, skipping read state sync");
            return;
        };

        debug!(count = ids.len(), "found messages to mark read");

        match self.api.sync_read_state(credentials, &channel_id, &ids).await {
            Ok(response) if response.is_ok() => {
                if let Err(e) = self.store.with(|db| db.mark_messages_read_origin(&ids)) {
                    error!(error = %e, "failed to clear read flags");
                }
            }
            Ok(response) => {
                debug!(status = response.status, "read state sync rejected");
            }
            Err(e) => debug!(error = %e, "read message state synchronize failed"),
        }
    }

    async fn sync_deleted_message_state(&self, credentials: &Credentials) {
        let ids = match self.store.with(|db| db.deleted_message_ids()) {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "failed to read pending deletions");
                return;
            }
        };
        if ids.is_empty() {
            return;
        }

        let Some(channel_id) = self.channel.channel_id() else {
            debug!("channel id does not exist, skipping delete state sync");
            return;
        };

        debug!(count = ids.len(), "found messages to delete");

        match self.api.sync_deleted_state(credentials, &channel_id, &ids).await {
            Ok(response) if response.is_ok() => {
                if let Err(e) = self.store.with(|db| db.delete_messages(&ids)) {
                    error!(error = %e, "failed to remove deleted messages");
                }
            }
            Ok(response) => {
                debug!(status = response.status, "delete state sync rejected");
            }
            Err(e) => debug!(error = %e, "deleted message state synchronize failed"),
        }
    }

    // ------------------------------------------------------------------
    // User
    // ------------------------------------------------------------------

    async fn on_update_user(&self, forcefully: bool) -> SyncOutcome {
        let now = self.clock.now_millis();

        if !forcefully {
            let last_update = match self.store.with(|db| db.get_i64(LAST_UPDATE_TIME, 0)) {
                Ok(last) => last,
                Err(e) => {
                    error!(error = %e, "failed to read last user update time");
                    self.user.on_user_updated(false);
                    return SyncOutcome::Failure;
                }
            };

            // A timestamp in the future is left alone and blocks the update.
            let due = last_update.saturating_add(self.user_update_interval_ms);
            if last_update > now || now < due {
                debug!(last_update, now, "inbox user not ready to update");
                return SyncOutcome::Skipped;
            }
        }

        let outcome = match self.user.is_created() {
            Ok(false) => self.create_user(now).await,
            Ok(true) => self.update_user(now).await,
            Err(e) => {
                error!(error = %e, "failed to load inbox user");
                SyncOutcome::Failure
            }
        };

        self.user.on_user_updated(outcome.is_success());
        outcome
    }

    async fn create_user(&self, now: i64) -> SyncOutcome {
        let Some(channel_id) = self.channel.channel_id() else {
            debug!("no channel, user will be created after channel registration finishes");
            return SyncOutcome::NotReady;
        };

        let response = match self.api.create_user(&channel_id).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "user creation failed");
                return SyncOutcome::Failure;
            }
        };

        if !response.is_successful() {
            debug!(status = response.status, "inbox user creation rejected");
            return SyncOutcome::Failure;
        }
        let Some(credentials) = response.result else {
            debug!(status = response.status, "user creation response had no credentials");
            return SyncOutcome::Failure;
        };

        match self.persist_created_user(credentials, &channel_id, now) {
            Ok(()) => SyncOutcome::Success,
            Err(e) => {
                error!(error = %e, "failed to store new inbox user");
                SyncOutcome::Failure
            }
        }
    }

    fn persist_created_user(
        &self,
        credentials: Credentials,
        channel_id: &ChannelId,
        now: i64,
    ) -> StoreResult<()> {
        // A new user has no history: drop the cursor before the user exists.
        self.store
            .with(|db| db.remove_preference(LAST_MESSAGE_REFRESH_TIME))?;
        self.user
            .on_created(credentials, channel_id, self.clock.now())?;
        self.store.with(|db| db.put_i64(LAST_UPDATE_TIME, now))
    }

    async fn update_user(&self, now: i64) -> SyncOutcome {
        let Some(channel_id) = self.channel.channel_id() else {
            debug!("no channel, skipping inbox user update");
            return SyncOutcome::NotReady;
        };

        let credentials = match self.user.credentials() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => return SyncOutcome::NotReady,
            Err(e) => {
                error!(error = %e, "failed to load inbox user");
                return SyncOutcome::Failure;
            }
        };

        let response = match self.api.update_user(&credentials, &channel_id).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "user update failed");
                return SyncOutcome::Failure;
            }
        };

        if response.is_ok() {
            info!("inbox user updated");
            let recorded = self
                .store
                .with(|db| db.put_i64(LAST_UPDATE_TIME, now))
                .and_then(|()| self.user.on_updated(&channel_id));
            return match recorded {
                Ok(()) => SyncOutcome::Success,
                Err(e) => {
                    error!(error = %e, "failed to record user update");
                    SyncOutcome::Failure
                }
            };
        }

        debug!(status = response.status, "inbox user update rejected");
        // Epoch sentinel: the next non-forced check is always due.
        if let Err(e) = self.store.with(|db| db.put_i64(LAST_UPDATE_TIME, 0)) {
            error!(error = %e, "failed to reset last user update time");
        }
        SyncOutcome::Failure
    }
}
