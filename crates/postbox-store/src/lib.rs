//! # postbox-store
//!
//! Local message store for the Postbox inbox, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for inbox messages
//! (with their read/delete dirty flags), the engine's persisted scalars
//! (cursor, last user update) and the anonymous user credentials.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod preferences;
pub mod users;

mod error;

pub use database::{Database, SharedDatabase};
pub use error::{Result, StoreError};
pub use models::*;
