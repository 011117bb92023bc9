//! In-memory storage for conversations and notifications.
//!
//! Every conversation owns a broadcast channel so that live sockets opened on
//! it receive each persisted message, whichever path (socket or HTTP) it
//! arrived through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use placement_shared::{
    ChatFrame, ConversationId, Message, Notification, NotificationId, SenderRole, SubjectId,
};

/// Signal delivered to every live socket of a conversation.
#[derive(Debug, Clone)]
pub enum LiveSignal {
    Frame(ChatFrame),
    /// Close the socket from the server side.
    Disconnect,
    /// Drop the socket without a close handshake.
    Sever,
}

struct Room {
    messages: Vec<Message>,
    live: broadcast::Sender<LiveSignal>,
}

impl Room {
    fn new(buffer: usize) -> Self {
        let (live, _) = broadcast::channel(buffer);
        Self {
            messages: Vec::new(),
            live,
        }
    }
}

pub struct Backend {
    rooms: Mutex<HashMap<ConversationId, Room>>,
    notifications: Mutex<HashMap<SubjectId, Vec<Notification>>>,
    live_sockets: Arc<AtomicUsize>,
    live_buffer: usize,
}

impl Backend {
    pub fn new(live_buffer: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            notifications: Mutex::new(HashMap::new()),
            live_sockets: Arc::new(AtomicUsize::new(0)),
            live_buffer: live_buffer.max(1),
        }
    }

    // ── Conversations ───────────────────────────────────────────────────

    /// Historical transcript, oldest first.
    pub async fn history(&self, conversation: &ConversationId) -> Vec<Message> {
        let rooms = self.rooms.lock().await;
        let mut messages = rooms
            .get(conversation)
            .map(|room| room.messages.clone())
            .unwrap_or_default();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        messages
    }

    /// Persist a message with a fresh server id and fan it out to every live
    /// socket of the conversation.
    pub async fn append_message(
        &self,
        conversation: ConversationId,
        sender_role: SenderRole,
        body: String,
        correlation_id: Option<String>,
    ) -> Message {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.clone(),
            sender_role,
            body,
            created_at: Utc::now(),
            correlation_id,
        };

        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .entry(conversation)
            .or_insert_with(|| Room::new(self.live_buffer));
        room.messages.push(message.clone());
        let receivers = room
            .live
            .send(LiveSignal::Frame(ChatFrame::from_message(&message)))
            .unwrap_or(0);

        debug!(
            msg_id = %message.id,
            conversation = %message.conversation_id,
            receivers,
            "Message stored"
        );
        message
    }

    /// Insert an already-built message without broadcasting it. Used for
    /// seeding history.
    pub async fn seed_message(&self, message: Message) {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(message.conversation_id.clone())
            .or_insert_with(|| Room::new(self.live_buffer))
            .messages
            .push(message);
    }

    pub async fn subscribe(&self, conversation: &ConversationId) -> broadcast::Receiver<LiveSignal> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(conversation.clone())
            .or_insert_with(|| Room::new(self.live_buffer))
            .live
            .subscribe()
    }

    /// Close every live socket currently open on `conversation`.
    pub async fn disconnect(&self, conversation: &ConversationId) -> usize {
        let rooms = self.rooms.lock().await;
        let closed = rooms
            .get(conversation)
            .and_then(|room| room.live.send(LiveSignal::Disconnect).ok())
            .unwrap_or(0);
        info!(conversation = %conversation, closed, "Disconnecting live sockets");
        closed
    }

    /// Drop every live socket on `conversation` without a close frame, as a
    /// crashed or unreachable server would.
    pub async fn sever(&self, conversation: &ConversationId) -> usize {
        let rooms = self.rooms.lock().await;
        let severed = rooms
            .get(conversation)
            .and_then(|room| room.live.send(LiveSignal::Sever).ok())
            .unwrap_or(0);
        info!(conversation = %conversation, severed, "Severing live sockets");
        severed
    }

    /// Number of live sockets currently open across all conversations.
    pub fn live_sockets(&self) -> usize {
        self.live_sockets.load(Ordering::SeqCst)
    }

    pub(crate) fn track_socket(&self) -> SocketGuard {
        self.live_sockets.fetch_add(1, Ordering::SeqCst);
        SocketGuard {
            counter: self.live_sockets.clone(),
        }
    }

    // ── Notifications ───────────────────────────────────────────────────

    pub async fn create_notification(
        &self,
        subject: SubjectId,
        title: String,
        body: String,
    ) -> Notification {
        let notification = Notification {
            id: NotificationId::new(Uuid::new_v4().to_string()),
            subject_id: subject.clone(),
            title,
            body,
            read: false,
            created_at: Utc::now(),
        };
        self.notifications
            .lock()
            .await
            .entry(subject)
            .or_default()
            .push(notification.clone());
        notification
    }

    pub async fn unread_count(&self, subject: &SubjectId) -> u64 {
        let notifications = self.notifications.lock().await;
        notifications
            .get(subject)
            .map(|list| list.iter().filter(|n| !n.read).count() as u64)
            .unwrap_or(0)
    }

    /// Newest first, at most `limit` entries.
    pub async fn list_notifications(&self, subject: &SubjectId, limit: usize) -> Vec<Notification> {
        let notifications = self.notifications.lock().await;
        let mut list = notifications.get(subject).cloned().unwrap_or_default();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit);
        list
    }

    /// Mark a single notification read. Returns `None` if no such id exists,
    /// otherwise the number of entries that changed state (0 or 1).
    pub async fn mark_read(&self, id: &NotificationId) -> Option<u64> {
        let mut notifications = self.notifications.lock().await;
        for list in notifications.values_mut() {
            if let Some(n) = list.iter_mut().find(|n| &n.id == id) {
                let changed = !n.read;
                n.read = true;
                return Some(u64::from(changed));
            }
        }
        None
    }

    pub async fn mark_all_read(&self, subject: &SubjectId) -> u64 {
        let mut notifications = self.notifications.lock().await;
        let Some(list) = notifications.get_mut(subject) else {
            return 0;
        };
        let mut updated = 0;
        for n in list.iter_mut().filter(|n| !n.read) {
            n.read = true;
            updated += 1;
        }
        updated
    }

    /// Populate a demo conversation and a handful of notifications.
    pub async fn seed_demo(&self) {
        let conversation = ConversationId::from("demo");
        let subject = SubjectId::from("student-1");
        let start = Utc::now() - Duration::minutes(30);

        let lines = [
            (SenderRole::Subject, "Hello, I have a question about my visa appointment."),
            (SenderRole::Counterparty, "Sure, which consulate are you booked with?"),
            (SenderRole::Subject, "Madrid, next Thursday."),
        ];
        for (i, (role, body)) in lines.into_iter().enumerate() {
            self.seed_message(Message {
                id: Uuid::new_v4().to_string(),
                conversation_id: conversation.clone(),
                sender_role: role,
                body: body.to_string(),
                created_at: start + Duration::minutes(i as i64),
                correlation_id: None,
            })
            .await;
        }

        for title in ["Document approved", "Payment received", "Interview scheduled"] {
            self.create_notification(subject.clone(), title.to_string(), String::new())
                .await;
        }

        info!(conversation = %conversation, subject = %subject, "Seeded demo data");
    }
}

/// Decrements the live socket counter when the socket task ends.
pub(crate) struct SocketGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
