//! Plain-text rendering of transcript rows, the connection indicator and
//! notification entries.

use placement_shared::{ConnectionState, Message, Notification, SenderRole};

use crate::notifications::badge_label;

pub fn transcript_row(message: &Message, own_role: SenderRole) -> String {
    let who = if message.sender_role == own_role {
        "you"
    } else {
        match message.sender_role {
            SenderRole::Subject => "student",
            SenderRole::Counterparty => "staff",
        }
    };
    let pending = if message.is_local() { " (sent)" } else { "" };
    format!(
        "[{}] {who}: {}{pending}",
        message.created_at.format("%H:%M"),
        message.body
    )
}

/// Tracks how much of an append-only transcript has been rendered.
#[derive(Debug, Default)]
pub struct TranscriptCursor {
    rendered: usize,
}

impl TranscriptCursor {
    /// Rows for every message appended since the last call, in order.
    /// Messages appended as a side effect of another operation (live frames
    /// drained before a send) are included.
    pub fn take_new(&mut self, messages: &[Message], own_role: SenderRole) -> Vec<String> {
        if messages.len() < self.rendered {
            // The transcript was reset.
            self.rendered = 0;
        }
        let rows: Vec<String> = messages[self.rendered..]
            .iter()
            .map(|m| transcript_row(m, own_role))
            .collect();
        self.rendered = messages.len();
        rows
    }
}

pub fn connection_indicator(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "● live",
        ConnectionState::Connecting => "◌ connecting",
        ConnectionState::Disconnected => "○ offline",
    }
}

/// Bracketed badge, or an empty string when there is nothing unread.
pub fn badge(count: u64) -> String {
    badge_label(count)
        .map(|label| format!("[{label}]"))
        .unwrap_or_default()
}

pub fn notification_row(notification: &Notification) -> String {
    let marker = if notification.read { ' ' } else { '*' };
    let mut row = format!(
        "{marker} {} {}  ({})",
        notification.created_at.format("%Y-%m-%d %H:%M"),
        notification.title,
        notification.id
    );
    if !notification.body.is_empty() {
        row.push_str("\n    ");
        row.push_str(&notification.body);
    }
    row
}
