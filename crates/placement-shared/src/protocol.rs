use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::LIVE_ID_PREFIX;
use crate::error::ProtocolError;
use crate::models::Message;
use crate::types::{ConversationId, SenderRole};

/// Kind of a frame on the live chat channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// A chat message
    Message,
    /// Out-of-band error reported by the server; `body` carries the text
    Error,
}

/// JSON frame exchanged over the live channel, in both directions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatFrame {
    pub conversation_id: ConversationId,
    pub sender_role: SenderRole,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Server id; absent on client-originated frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatFrame {
    /// Outbound frame for a locally composed message.
    pub fn outbound(message: &Message) -> Self {
        Self {
            conversation_id: message.conversation_id.clone(),
            sender_role: message.sender_role,
            body: message.body.clone(),
            kind: FrameKind::Message,
            id: None,
            correlation_id: message.correlation_id.clone(),
            created_at: None,
        }
    }

    /// Server-side echo of a persisted message.
    pub fn from_message(message: &Message) -> Self {
        Self {
            conversation_id: message.conversation_id.clone(),
            sender_role: message.sender_role,
            body: message.body.clone(),
            kind: FrameKind::Message,
            id: Some(message.id.clone()),
            correlation_id: message.correlation_id.clone(),
            created_at: Some(message.created_at),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Convert a message frame into a transcript entry. Frames without a
    /// server id get a generated `live-` id, frames without a timestamp are
    /// stamped with the arrival time.
    pub fn into_message(self) -> Result<Message, ProtocolError> {
        if self.kind != FrameKind::Message {
            return Err(ProtocolError::UnexpectedFrame(format!("{:?}", self.kind)));
        }
        Ok(Message {
            id: self
                .id
                .unwrap_or_else(|| format!("{LIVE_ID_PREFIX}{}", Uuid::new_v4())),
            conversation_id: self.conversation_id,
            sender_role: self.sender_role,
            body: self.body,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            correlation_id: self.correlation_id,
        })
    }
}

/// Failure half of an [`Envelope`]. The message is shown to the user verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiFailure {
    pub message: String,
}

impl ApiFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Tagged response schema returned by every HTTP endpoint.
///
/// `{"status":"ok","data":...}` or `{"status":"error","error":{"message":...}}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Ok { data: T },
    Error { error: ApiFailure },
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self::Ok { data }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Error {
            error: ApiFailure::new(message),
        }
    }

    pub fn into_result(self) -> Result<T, ApiFailure> {
        match self {
            Self::Ok { data } => Ok(data),
            Self::Error { error } => Err(error),
        }
    }
}

/// Body of `POST /messages`, the durable fallback send
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub conversation_id: ConversationId,
    pub sender_role: SenderRole,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl From<&Message> for PostMessageRequest {
    fn from(message: &Message) -> Self {
        Self {
            conversation_id: message.conversation_id.clone(),
            sender_role: message.sender_role,
            body: message.body.clone(),
            correlation_id: message.correlation_id.clone(),
        }
    }
}

/// Result of a mark-read or mark-all-read request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MarkReadAck {
    pub updated: u64,
}

/// Body of the admin-scoped notification creation endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateNotificationRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wire_shape() {
        let raw = r#"{"conversationId":"C","senderRole":"counterparty","body":"hi","type":"message"}"#;
        let frame = ChatFrame::parse(raw).unwrap();
        assert_eq!(frame.kind, FrameKind::Message);

        let msg = frame.into_message().unwrap();
        assert!(msg.id.starts_with(LIVE_ID_PREFIX));
        assert_eq!(msg.body, "hi");
        assert_eq!(msg.sender_role, SenderRole::Counterparty);
    }

    #[test]
    fn test_error_frame_is_not_a_message() {
        let raw = r#"{"conversationId":"C","senderRole":"subject","body":"boom","type":"error"}"#;
        let frame = ChatFrame::parse(raw).unwrap();
        assert!(matches!(
            frame.into_message(),
            Err(ProtocolError::UnexpectedFrame(_))
        ));
    }

    #[test]
    fn test_outbound_frame_carries_correlation() {
        let msg = Message::local(ConversationId::from("C"), SenderRole::Subject, "hola".into());
        let json = ChatFrame::outbound(&msg).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["correlationId"], msg.correlation_id.unwrap().as_str());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_envelope_tagging() {
        let ok: Envelope<MarkReadAck> =
            serde_json::from_str(r#"{"status":"ok","data":{"updated":3}}"#).unwrap();
        assert_eq!(ok.into_result().unwrap().updated, 3);

        let err: Envelope<MarkReadAck> =
            serde_json::from_str(r#"{"status":"error","error":{"message":"nope"}}"#).unwrap();
        assert_eq!(err.into_result().unwrap_err().to_string(), "nope");
    }

    #[test]
    fn test_envelope_rejects_untagged_payload() {
        let res: Result<Envelope<MarkReadAck>, _> = serde_json::from_str(r#"{"success":true}"#);
        assert!(res.is_err());
    }
}
