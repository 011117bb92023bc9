//! Domain model structs exchanged with the placement API.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names so it can be handed straight to and from the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TEMP_ID_PREFIX;
use crate::types::{ConversationId, NotificationId, SenderRole, SubjectId};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message. Never mutated once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server id, or a `tmp-` prefixed id for a local optimistic send.
    pub id: String,
    pub conversation_id: ConversationId,
    pub sender_role: SenderRole,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Client-generated id carried through the live and durable send paths,
    /// used to recognise the server echo of a local send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Message {
    /// Build a local optimistic message with a fresh temporary id and
    /// correlation id.
    pub fn local(conversation_id: ConversationId, sender_role: SenderRole, body: String) -> Self {
        let correlation = Uuid::new_v4();
        Self {
            id: format!("{TEMP_ID_PREFIX}{correlation}"),
            conversation_id,
            sender_role,
            body,
            created_at: Utc::now(),
            correlation_id: Some(correlation.to_string()),
        }
    }

    /// Whether this message was created locally and has no server id.
    pub fn is_local(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub subject_id: SubjectId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Response body of the unread-count endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UnreadCount {
    pub unread: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_message_ids() {
        let msg = Message::local(ConversationId::from("c1"), SenderRole::Subject, "hola".into());
        assert!(msg.is_local());
        let correlation = msg.correlation_id.clone().unwrap();
        assert!(msg.id.ends_with(&correlation));
    }

    #[test]
    fn test_message_wire_shape() {
        let json = r#"{
            "id": "m1",
            "conversationId": "c1",
            "senderRole": "counterparty",
            "body": "hi",
            "createdAt": "2024-05-01T10:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sender_role, SenderRole::Counterparty);
        assert!(msg.correlation_id.is_none());
        assert!(!msg.is_local());
    }
}
