//! Conversation view state: the transcript and the session that feeds it.

pub mod session;
pub mod transcript;

pub use session::{ChatSession, DeliveryPath, LiveUpdate, ReceiveOutcome, SendReceipt, SessionPhase};
pub use transcript::{MergeOutcome, Transcript};
