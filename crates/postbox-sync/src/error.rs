use thiserror::Error;

use postbox_store::StoreError;

/// Failures of a single remote call.
#[derive(Error, Debug)]
pub enum RequestError {
    /// Connection, TLS, timeout or other transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered but the body could not be understood.
    #[error("Invalid response body: {0}")]
    Decode(String),
}

/// Errors surfaced by the inbox facade and the dispatcher.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job dispatcher has shut down")]
    DispatcherClosed,
}
