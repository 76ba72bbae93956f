//! Read-only access to the installation's push channel id.
//!
//! Channel registration lives elsewhere; the engine only needs to know the
//! current id, if any, at the moment it makes a call.

use tokio::sync::watch;

use postbox_shared::types::ChannelId;

pub trait ChannelIdProvider: Send + Sync {
    fn channel_id(&self) -> Option<ChannelId>;
}

/// A channel id fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticChannel(pub Option<ChannelId>);

impl StaticChannel {
    pub fn new(id: &str) -> Self {
        Self(ChannelId::parse(id))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl ChannelIdProvider for StaticChannel {
    fn channel_id(&self) -> Option<ChannelId> {
        self.0.clone()
    }
}

// Fed by whatever registers the channel.
impl ChannelIdProvider for watch::Receiver<Option<ChannelId>> {
    fn channel_id(&self) -> Option<ChannelId> {
        self.borrow().clone()
    }
}
