//! Client state shared by every view.
//!
//! [`ClientState`] wires the configuration, session context, API client,
//! event bus and notification hub together once, and hands out per-view
//! components built from them.

use std::sync::Arc;

use crate::chat::ChatSession;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::notifications::{NotificationCenter, NotificationHub};
use crate::session::{SessionContext, SessionStore};
use crate::transport::ApiClient;

/// Central client state.
#[derive(Clone)]
pub struct ClientState {
    pub config: Arc<ClientConfig>,
    pub session: SessionContext,
    pub api: ApiClient,
    pub events: EventBus,
    pub notifications: NotificationHub,
}

impl ClientState {
    /// Build state around an existing session context.
    pub fn new(config: ClientConfig, session: SessionContext) -> Result<Self> {
        let config = Arc::new(config);
        let api = ApiClient::new(config.clone(), session.clone())?;
        let events = EventBus::new(config.event_buffer);
        let notifications = NotificationHub::new(api.clone(), config.poll_interval);
        Ok(Self {
            config,
            session,
            api,
            events,
            notifications,
        })
    }

    /// Build state with the session persisted at the configured location.
    pub fn with_persistent_session(config: ClientConfig) -> Result<Self> {
        let store = match config.session_file {
            Some(ref path) => SessionStore::at(path),
            None => SessionStore::default_location()?,
        };
        let session = SessionContext::with_store(store)?;
        Self::new(config, session)
    }

    pub fn chat_session(&self) -> ChatSession {
        ChatSession::new(self.api.clone(), self.events.clone())
    }

    /// Mount a notification view for the logged-in subject.
    pub fn notification_center(&self) -> Result<NotificationCenter> {
        NotificationCenter::mount(self.api.clone(), &self.notifications, self.events.clone())
    }
}
