use tokio::sync::broadcast;

use placement_shared::{ConnectionState, ConversationId, SubjectId};

/// State changes the presentation layer re-renders on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    MessageAppended {
        conversation_id: ConversationId,
        message_id: String,
        local: bool,
    },
    ConnectionChanged {
        conversation_id: ConversationId,
        state: ConnectionState,
    },
    ConversationUnreadChanged {
        conversation_id: ConversationId,
        count: u64,
    },
    NotificationUnreadChanged {
        subject_id: SubjectId,
        count: u64,
    },
}

/// Fan-out of [`ClientEvent`]s to any number of listeners.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(event = ?e.0, "No event listeners");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
