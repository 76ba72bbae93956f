//! # postbox-agent
//!
//! Headless inbox agent.  Keeps the local inbox database in step with the
//! message center:
//! - queues a (throttled) user update and a message refresh every refresh
//!   interval
//! - refreshes messages as soon as a user create/update succeeds
//! - pushes local read and delete state as part of every refresh

mod config;

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use postbox_shared::jobs::SyncAction;
use postbox_store::Database;
use postbox_sync::{
    EventBus, HttpRemoteApi, InboxEvent, JobDispatcher, StaticChannel, SyncEngine, SystemClock,
    User,
};

use crate::config::AgentConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,postbox_sync=debug,postbox_store=info")),
        )
        .init();

    info!("Starting postbox agent v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = AgentConfig::from_env();
    info!(
        api_url = %config.sync.api_url,
        channel = ?config.channel_id,
        refresh_secs = config.refresh_interval.as_secs(),
        "Loaded configuration"
    );
    if config.channel_id.is_none() {
        warn!("POSTBOX_CHANNEL_ID is not set, the inbox user cannot be created");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    if let Some(path) = db.path() {
        info!(path = %path.display(), "Inbox database ready");
    }
    let store = db.into_shared();

    let events = EventBus::default();
    let api = Arc::new(HttpRemoteApi::new(&config.sync)?);
    let channel = match &config.channel_id {
        Some(id) => StaticChannel::new(id),
        None => StaticChannel::none(),
    };
    let user = User::new(store.clone(), events.clone());

    let engine = SyncEngine::new(
        store,
        api,
        user,
        Arc::new(channel),
        Arc::new(SystemClock),
        events.clone(),
    )
    .with_user_update_interval(config.sync.user_update_interval_ms);

    let dispatcher = JobDispatcher::spawn(Arc::new(engine), config.sync.retry.clone());
    let jobs = dispatcher.handle();

    // -----------------------------------------------------------------------
    // 4. Run until Ctrl+C
    // -----------------------------------------------------------------------
    let mut refresh = tokio::time::interval(config.refresh_interval);
    let mut inbox_events = events.subscribe();

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                debug!("Queueing periodic inbox refresh");
                jobs.enqueue(SyncAction::UpdateUser { forcefully: false }).await?;
                jobs.enqueue(SyncAction::UpdateMessages).await?;
            }
            event = inbox_events.recv() => match event {
                Ok(InboxEvent::UserUpdated { success: true }) => {
                    jobs.enqueue(SyncAction::UpdateMessages).await?;
                }
                Ok(InboxEvent::MessagesUpdated { success }) => {
                    info!(success, "Inbox refresh finished");
                }
                Ok(InboxEvent::UserUpdated { success: false }) => {
                    debug!("Inbox user update did not succeed");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Inbox event listener lagged");
                }
                Err(RecvError::Closed) => {
                    error!("Inbox event bus closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    dispatcher.shutdown().await;
    info!("Postbox agent stopped");
    Ok(())
}
