//! # postbox-sync
//!
//! Keeps the local inbox store consistent with the remote message center.
//!
//! The [`SyncEngine`] runs one attempt of one job action at a time; the
//! [`JobDispatcher`] queues actions, serialises them per action class and
//! retries failed attempts with exponential backoff.  [`Inbox`] is the read
//! path a UI talks to.

pub mod api;
pub mod channel;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod events;
pub mod http;
pub mod inbox;
pub mod reconcile;
pub mod retry;
pub mod user;

mod error;

#[cfg(test)]
mod testing;

pub use api::{ApiResponse, RemoteApi};
pub use channel::{ChannelIdProvider, StaticChannel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use dispatcher::{DispatcherHandle, JobDispatcher};
pub use engine::{SyncEngine, SyncOutcome};
pub use error::{RequestError, SyncError};
pub use events::{EventBus, InboxEvent};
pub use http::HttpRemoteApi;
pub use inbox::Inbox;
pub use reconcile::ReconcileReport;
pub use retry::RetryConfig;
pub use user::User;
