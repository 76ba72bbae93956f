//! Notifications for components that react to sync results.

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboxEvent {
    /// An `UpdateMessages` attempt finished.
    MessagesUpdated { success: bool },
    /// A user create or update attempt finished.
    UserUpdated { success: bool },
}

/// Broadcast fan-out of [`InboxEvent`]s.  Sending with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InboxEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboxEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: InboxEvent) {
        tracing::trace!(?event, "emitting inbox event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(InboxEvent::UserUpdated { success: true });
        assert_eq!(rx.recv().await.unwrap(), InboxEvent::UserUpdated { success: true });
    }

    #[test]
    fn emit_without_subscribers_is_harmless() {
        EventBus::default().emit(InboxEvent::MessagesUpdated { success: false });
    }
}
