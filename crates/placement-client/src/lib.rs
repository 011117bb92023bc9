//! # placement-client
//!
//! Chat and notification client for the placement service.
//!
//! - [`chat::ChatSession`] keeps one live WebSocket per open conversation and
//!   merges history, optimistic local sends and live messages into an
//!   ordered transcript.
//! - [`notifications::NotificationHub`] polls unread counts once per subject
//!   and fans them out to every mounted [`notifications::NotificationCenter`].
//! - [`session::SessionContext`] carries the logged-in identity and is
//!   injected into every component.

pub mod chat;
pub mod config;
pub mod events;
pub mod logging;
pub mod notifications;
pub mod session;
pub mod state;
pub mod transport;
pub mod view;

mod error;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::{Session, SessionContext, SessionStore};
pub use state::ClientState;
