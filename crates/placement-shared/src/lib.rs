//! # placement-shared
//!
//! Types shared between the placement client and the reference backend:
//! the conversation/notification data model, the JSON frames carried over
//! the live chat channel, and the tagged response envelope every HTTP
//! endpoint answers with.
//!
//! Nothing in here performs I/O.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use models::{Message, Notification, UnreadCount};
pub use protocol::{
    ApiFailure, ChatFrame, CreateNotificationRequest, Envelope, FrameKind, MarkReadAck,
    PostMessageRequest,
};
pub use types::{ConnectionState, ConversationId, NotificationId, SenderRole, SubjectId};
