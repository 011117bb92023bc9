//! Chat session manager.
//!
//! A [`ChatSession`] shows one conversation at a time and holds at most one
//! live connection for it:
//!
//! ```text
//! Closed --open--> Loading --socket up--> Live --error/close--> Disconnected
//!   ^                  |                   |                        |
//!   |                  +--socket failed----|------------------------+
//!   +----------------------close-----------+------------------------+
//! ```
//!
//! Connection failures are never retried. Leaving and reopening the
//! conversation is the only way back to `Live`.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use placement_shared::{
    ChatFrame, ConnectionState, ConversationId, FrameKind, Message, PostMessageRequest, SenderRole,
};

use crate::chat::transcript::{MergeOutcome, Transcript};
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::transport::{ApiClient, LiveConnection, LiveEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Closed,
    Loading,
    Live,
    Disconnected,
}

/// How a sent message left the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    /// Pushed over the open live connection.
    Live,
    /// One-shot `POST /messages` because no live connection was open.
    Durable,
}

#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// The optimistic transcript entry.
    pub message: Message,
    pub path: DeliveryPath,
    /// `false` when delivery failed; the failure has been logged and the
    /// transcript entry stays.
    pub delivered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Appended { unread_incremented: bool },
    Duplicate,
    /// Not for this conversation, an error frame, or no conversation open.
    Ignored,
}

/// Effect of one live event on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveUpdate {
    Received(ReceiveOutcome),
    Disconnected,
}

pub struct ChatSession {
    api: ApiClient,
    events: EventBus,
    conversation: Option<ConversationId>,
    role: SenderRole,
    phase: SessionPhase,
    transcript: Transcript,
    connection: Option<LiveConnection>,
    live_rx: Option<mpsc::Receiver<LiveEvent>>,
    focused: bool,
    unread: u64,
}

impl ChatSession {
    pub fn new(api: ApiClient, events: EventBus) -> Self {
        let role = api.session().role();
        Self {
            api,
            events,
            conversation: None,
            role,
            phase: SessionPhase::Closed,
            transcript: Transcript::new(),
            connection: None,
            live_rx: None,
            focused: false,
            unread: 0,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn conversation(&self) -> Option<&ConversationId> {
        self.conversation.as_ref()
    }

    pub fn role(&self) -> SenderRole {
        self.role
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn unread(&self) -> u64 {
        self.unread
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// `Connecting` while the conversation is loading, then whatever the
    /// live connection reports.
    pub fn connection_state(&self) -> ConnectionState {
        if self.phase == SessionPhase::Loading {
            return ConnectionState::Connecting;
        }
        self.connection
            .as_ref()
            .map(LiveConnection::state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn has_live_connection(&self) -> bool {
        self.connection.is_some()
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Fetch the conversation's history, then open its live connection.
    ///
    /// Transport failures are logged and leave the session `Disconnected`
    /// with whatever history was loaded; only configuration errors are
    /// returned.
    pub async fn open_conversation(&mut self, conversation: ConversationId) -> Result<()> {
        if self.conversation.is_some() {
            self.close_conversation().await;
        }

        self.role = self.api.session().role();
        self.conversation = Some(conversation.clone());
        self.unread = 0;
        self.set_phase(SessionPhase::Loading);
        self.emit_connection();

        match self.api.fetch_history(&conversation).await {
            Ok(history) => {
                debug!(conversation = %conversation, count = history.len(), "History loaded");
                self.transcript.load_history(history);
            }
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "Failed to load history");
            }
        }

        let url = self.api.config().live_url(&conversation, self.role)?;
        let buffer = self.api.config().event_buffer;
        let (tx, rx) = mpsc::channel(buffer.max(1));

        match LiveConnection::connect(&url, conversation.clone(), tx, buffer).await {
            Ok(connection) => {
                self.connection = Some(connection);
                self.live_rx = Some(rx);
                self.set_phase(SessionPhase::Live);
            }
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "Live channel unavailable");
                self.set_phase(SessionPhase::Disconnected);
            }
        }

        self.emit_connection();
        Ok(())
    }

    /// Append an optimistic local message, then deliver it over the live
    /// connection if open, or through the durable HTTP write otherwise.
    ///
    /// Blank input is rejected before anything changes. Delivery failures
    /// are not retried and not reflected in the transcript.
    pub async fn send_message(&mut self, text: &str) -> Result<SendReceipt> {
        let body = text.trim();
        if body.is_empty() {
            return Err(ClientError::Validation("message is empty".into()));
        }
        let conversation = self
            .conversation
            .clone()
            .ok_or_else(|| ClientError::Validation("no conversation is open".into()))?;

        // Observe a disconnect that is already queued before picking a path.
        self.drain_live_events();

        let message = Message::local(conversation.clone(), self.role, body.to_string());
        self.transcript.push_local(message.clone());
        self.events.emit(ClientEvent::MessageAppended {
            conversation_id: conversation.clone(),
            message_id: message.id.clone(),
            local: true,
        });

        let live = self.connection.as_ref().filter(|c| c.is_open());
        let (path, delivered) = match live {
            Some(connection) => match connection.send(&ChatFrame::outbound(&message)) {
                Ok(()) => (DeliveryPath::Live, true),
                Err(e) => {
                    warn!(conversation = %conversation, msg_id = %message.id, error = %e, "Live send failed");
                    (DeliveryPath::Live, false)
                }
            },
            None => match self.api.post_message(&PostMessageRequest::from(&message)).await {
                Ok(stored) => {
                    debug!(msg_id = %message.id, server_id = %stored.id, "Message stored via HTTP");
                    (DeliveryPath::Durable, true)
                }
                Err(e) => {
                    warn!(conversation = %conversation, msg_id = %message.id, error = %e, "Durable send failed");
                    (DeliveryPath::Durable, false)
                }
            },
        };

        info!(msg_id = %message.id, conversation = %conversation, ?path, delivered, "Message sent");
        Ok(SendReceipt {
            message,
            path,
            delivered,
        })
    }

    /// Parse an inbound frame and merge it into the transcript. A message
    /// from the other party bumps the unread indicator while the view is
    /// not focused.
    pub fn receive_message(&mut self, raw: &str) -> Result<ReceiveOutcome> {
        let frame = ChatFrame::parse(raw)?;

        let Some(conversation) = self.conversation.clone() else {
            return Ok(ReceiveOutcome::Ignored);
        };
        if frame.conversation_id != conversation {
            debug!(expected = %conversation, got = %frame.conversation_id, "Frame for another conversation");
            return Ok(ReceiveOutcome::Ignored);
        }
        if frame.kind == FrameKind::Error {
            warn!(conversation = %conversation, reason = %frame.body, "Server reported a live channel error");
            return Ok(ReceiveOutcome::Ignored);
        }

        let message = frame.into_message()?;
        let from_other_party = message.sender_role == self.role.other();
        let message_id = message.id.clone();

        match self.transcript.merge_inbound(message) {
            MergeOutcome::Duplicate => {
                debug!(msg_id = %message_id, "Dropped echo of a local message");
                Ok(ReceiveOutcome::Duplicate)
            }
            MergeOutcome::Appended => {
                self.events.emit(ClientEvent::MessageAppended {
                    conversation_id: conversation.clone(),
                    message_id,
                    local: false,
                });
                let unread_incremented = from_other_party && !self.focused;
                if unread_incremented {
                    self.unread += 1;
                    self.emit_unread(&conversation);
                }
                Ok(ReceiveOutcome::Appended { unread_incremented })
            }
        }
    }

    /// Mark the conversation view focused or not. Focusing clears the
    /// unread indicator.
    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        if focused && self.unread > 0 {
            self.unread = 0;
            if let Some(conversation) = self.conversation.clone() {
                self.emit_unread(&conversation);
            }
        }
    }

    /// Wait for the next live event and apply it. Returns `None` when there
    /// is no live connection to wait on.
    pub async fn next_live_event(&mut self) -> Option<LiveUpdate> {
        let rx = self.live_rx.as_mut()?;
        match rx.recv().await {
            Some(event) => Some(self.apply_live_event(event)),
            None => {
                self.mark_disconnected("live event channel ended");
                Some(LiveUpdate::Disconnected)
            }
        }
    }

    /// Apply every live event already buffered, without waiting.
    pub fn drain_live_events(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let Some(rx) = self.live_rx.as_mut() else {
                break;
            };
            match rx.try_recv() {
                Ok(event) => {
                    self.apply_live_event(event);
                    applied += 1;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.mark_disconnected("live event channel ended");
                    break;
                }
            }
        }
        applied
    }

    pub fn apply_live_event(&mut self, event: LiveEvent) -> LiveUpdate {
        match event {
            LiveEvent::Frame(raw) => match self.receive_message(&raw) {
                Ok(outcome) => LiveUpdate::Received(outcome),
                Err(e) => {
                    warn!(error = %e, "Discarding malformed live frame");
                    LiveUpdate::Received(ReceiveOutcome::Ignored)
                }
            },
            LiveEvent::Closed => {
                self.mark_disconnected("closed by server");
                LiveUpdate::Disconnected
            }
            LiveEvent::Error(reason) => {
                self.mark_disconnected(&reason);
                LiveUpdate::Disconnected
            }
        }
    }

    /// Close the live connection and reset to `Closed`. Safe to call in any
    /// phase.
    pub async fn close_conversation(&mut self) {
        self.live_rx = None;
        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }

        if let Some(conversation) = self.conversation.take() {
            info!(conversation = %conversation, "Conversation closed");
            self.events.emit(ClientEvent::ConnectionChanged {
                conversation_id: conversation,
                state: ConnectionState::Disconnected,
            });
        }
        self.transcript.clear();
        self.unread = 0;
        self.set_phase(SessionPhase::Closed);
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn mark_disconnected(&mut self, reason: &str) {
        self.live_rx = None;
        self.connection = None;
        if matches!(self.phase, SessionPhase::Live | SessionPhase::Loading) {
            warn!(conversation = ?self.conversation, reason, "Live channel lost");
            self.set_phase(SessionPhase::Disconnected);
            self.emit_connection();
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "Chat session phase");
            self.phase = phase;
        }
    }

    fn emit_connection(&self) {
        if let Some(conversation) = self.conversation.clone() {
            self.events.emit(ClientEvent::ConnectionChanged {
                conversation_id: conversation,
                state: self.connection_state(),
            });
        }
    }

    fn emit_unread(&self, conversation: &ConversationId) {
        self.events.emit(ClientEvent::ConversationUnreadChanged {
            conversation_id: conversation.clone(),
            count: self.unread,
        });
    }
}
