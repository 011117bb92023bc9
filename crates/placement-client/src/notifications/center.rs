use tracing::{debug, info};

use placement_shared::{Notification, NotificationId, SubjectId};

use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::notifications::badge_label;
use crate::notifications::hub::{NotificationHub, UnreadSnapshot, UnreadSubscription};
use crate::transport::ApiClient;

/// Unread count as displayed: the latest poll, unless a local mark-read
/// happened since that poll. The next tick always wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadState {
    feed: UnreadSnapshot,
    local: Option<LocalOverride>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocalOverride {
    count: u64,
    tick: u64,
}

impl UnreadState {
    pub fn observe(&mut self, snapshot: UnreadSnapshot) {
        self.feed = snapshot;
        if matches!(self.local, Some(o) if snapshot.tick > o.tick) {
            self.local = None;
        }
    }

    pub fn count(&self) -> u64 {
        match self.local {
            Some(o) if o.tick == self.feed.tick => o.count,
            _ => self.feed.count,
        }
    }

    pub fn decrement(&mut self, by: u64) {
        let count = self.count().saturating_sub(by);
        self.local = Some(LocalOverride {
            count,
            tick: self.feed.tick,
        });
    }

    pub fn zero(&mut self) {
        self.local = Some(LocalOverride {
            count: 0,
            tick: self.feed.tick,
        });
    }
}

/// Notification badge and dropdown for one mounted view.
pub struct NotificationCenter {
    api: ApiClient,
    events: EventBus,
    subscription: UnreadSubscription,
    state: UnreadState,
    items: Vec<Notification>,
    expanded: bool,
}

impl NotificationCenter {
    /// Mount for the logged-in subject and start (or join) its poller.
    pub fn mount(api: ApiClient, hub: &NotificationHub, events: EventBus) -> Result<Self> {
        let subject = api.session().subject_id().ok_or(ClientError::NoSession)?;
        let subscription = hub.subscribe(subject);
        let mut center = Self {
            api,
            events,
            subscription,
            state: UnreadState::default(),
            items: Vec::new(),
            expanded: false,
        };
        center.sync();
        Ok(center)
    }

    pub fn subject(&self) -> &SubjectId {
        self.subscription.subject()
    }

    /// Current unread count, folding in the latest poll.
    pub fn unread(&mut self) -> u64 {
        self.sync()
    }

    pub fn badge(&mut self) -> Option<String> {
        badge_label(self.unread())
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Wait for the next poll tick. `None` once the poller is gone.
    pub async fn changed(&mut self) -> Option<u64> {
        let snapshot = self.subscription.changed().await?;
        self.state.observe(snapshot);
        let count = self.state.count();
        self.emit(count);
        Some(count)
    }

    /// Open the dropdown: fetch one page of notifications, independent of
    /// the poll interval.
    pub async fn expand(&mut self) -> Result<&[Notification]> {
        let limit = self.api.config().page_size;
        let items = self.api.list_notifications(self.subject(), limit).await?;
        debug!(subject = %self.subject(), count = items.len(), "Notifications listed");
        self.items = items;
        self.expanded = true;
        Ok(&self.items)
    }

    pub fn collapse(&mut self) {
        self.expanded = false;
    }

    /// Mark one notification read; the local count drops once the request
    /// has succeeded.
    pub async fn mark_read(&mut self, id: &NotificationId) -> Result<()> {
        let ack = self.api.mark_read(id).await?;

        let was_unread = match self.items.iter_mut().find(|n| &n.id == id) {
            Some(item) => {
                let was_unread = !item.read;
                item.read = true;
                was_unread
            }
            None => ack.updated > 0,
        };
        self.sync();
        if was_unread {
            self.state.decrement(1);
        }
        let count = self.state.count();
        info!(id = %id, unread = count, "Notification marked read");
        self.emit(count);
        Ok(())
    }

    /// Mark everything read; the local count is zero once the request has
    /// succeeded, until the next poll.
    pub async fn mark_all_read(&mut self) -> Result<()> {
        let subject = self.subject().clone();
        let ack = self.api.mark_all_read(&subject).await?;

        for item in &mut self.items {
            item.read = true;
        }
        self.sync();
        self.state.zero();
        info!(subject = %subject, updated = ack.updated, "All notifications marked read");
        self.emit(0);
        Ok(())
    }

    fn sync(&mut self) -> u64 {
        self.state.observe(self.subscription.current());
        self.state.count()
    }

    fn emit(&self, count: u64) {
        self.events.emit(ClientEvent::NotificationUnreadChanged {
            subject_id: self.subject().clone(),
            count,
        });
    }
}
