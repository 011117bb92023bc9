use std::collections::HashSet;

use placement_shared::Message;

/// Result of merging an inbound message into a [`Transcript`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Appended,
    /// Echo of a message already in the transcript (same correlation id).
    Duplicate,
}

/// Append-only, ordered list of the messages shown for one conversation.
///
/// History is loaded once per open, oldest first; everything after that is
/// appended in arrival order. Messages are never edited or removed, only
/// dropped wholesale by [`Transcript::clear`] when the conversation closes.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    correlations: HashSet<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append historical messages, sorted ascending by creation time. The
    /// sort is stable, so equal timestamps keep server order.
    pub fn load_history(&mut self, mut history: Vec<Message>) {
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        for message in history {
            self.merge_inbound(message);
        }
    }

    /// Append a locally composed message.
    pub fn push_local(&mut self, message: Message) {
        self.remember(&message);
        self.messages.push(message);
    }

    /// Append a message received from the server unless it echoes one we
    /// already hold.
    pub fn merge_inbound(&mut self, message: Message) -> MergeOutcome {
        if let Some(ref correlation) = message.correlation_id {
            if self.correlations.contains(correlation) {
                return MergeOutcome::Duplicate;
            }
        }
        self.remember(&message);
        self.messages.push(message);
        MergeOutcome::Appended
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.correlations.clear();
    }

    fn remember(&mut self, message: &Message) {
        if let Some(ref correlation) = message.correlation_id {
            self.correlations.insert(correlation.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use placement_shared::{ConversationId, SenderRole};

    use super::*;

    fn server_msg(id: &str, offset_secs: i64, correlation: Option<&str>) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: ConversationId::from("C"),
            sender_role: SenderRole::Counterparty,
            body: id.to_string(),
            created_at: Utc::now() + Duration::seconds(offset_secs),
            correlation_id: correlation.map(String::from),
        }
    }

    #[test]
    fn test_history_sorted_oldest_first() {
        let mut t = Transcript::new();
        t.load_history(vec![
            server_msg("b", 20, None),
            server_msg("a", 10, None),
            server_msg("c", 30, None),
        ]);
        let ids: Vec<_> = t.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_echo_of_local_send_is_dropped() {
        let mut t = Transcript::new();
        let local = Message::local(ConversationId::from("C"), SenderRole::Subject, "hola".into());
        let correlation = local.correlation_id.clone().unwrap();
        t.push_local(local);

        let echo = server_msg("srv-1", 0, Some(&correlation));
        assert_eq!(t.merge_inbound(echo), MergeOutcome::Duplicate);
        assert_eq!(t.len(), 1);
        assert!(t.last().unwrap().is_local());
    }

    #[test]
    fn test_same_server_id_without_correlation_is_kept() {
        let mut t = Transcript::new();
        assert_eq!(t.merge_inbound(server_msg("x", 0, None)), MergeOutcome::Appended);
        assert_eq!(t.merge_inbound(server_msg("x", 0, None)), MergeOutcome::Appended);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_clear_forgets_correlations() {
        let mut t = Transcript::new();
        t.merge_inbound(server_msg("x", 0, Some("k")));
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.merge_inbound(server_msg("x", 0, Some("k"))), MergeOutcome::Appended);
    }
}
