//! Shared unread-count polling.
//!
//! The hub runs at most one polling task per subject, however many views
//! watch that subject. Each task fetches immediately, then on every interval
//! tick, and publishes the result on a `watch` channel. The task stops when
//! the last [`UnreadSubscription`] for its subject is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use placement_shared::SubjectId;

use crate::transport::ApiClient;

/// Latest polled value. `tick` counts successful polls; 0 means none yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnreadSnapshot {
    pub count: u64,
    pub tick: u64,
}

struct Poller {
    rx: watch::Receiver<UnreadSnapshot>,
    task: JoinHandle<()>,
    subscribers: usize,
}

#[derive(Clone)]
pub struct NotificationHub {
    api: ApiClient,
    interval: Duration,
    pollers: Arc<Mutex<HashMap<SubjectId, Poller>>>,
}

impl NotificationHub {
    pub fn new(api: ApiClient, interval: Duration) -> Self {
        Self {
            api,
            interval,
            pollers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Watch `subject`'s unread count, starting its poller if needed. Must be
    /// called from within a Tokio runtime.
    pub fn subscribe(&self, subject: SubjectId) -> UnreadSubscription {
        let mut pollers = self.pollers.lock().unwrap_or_else(|e| e.into_inner());

        let poller = pollers.entry(subject.clone()).or_insert_with(|| {
            let (tx, rx) = watch::channel(UnreadSnapshot::default());
            let task = tokio::spawn(poll_loop(
                self.api.clone(),
                subject.clone(),
                self.interval,
                tx,
            ));
            info!(subject = %subject, interval_secs = self.interval.as_secs(), "Unread poller started");
            Poller {
                rx,
                task,
                subscribers: 0,
            }
        });
        poller.subscribers += 1;

        UnreadSubscription {
            subject,
            rx: poller.rx.clone(),
            pollers: self.pollers.clone(),
        }
    }

    /// Number of polling tasks currently running.
    pub fn active_pollers(&self) -> usize {
        self.pollers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// A view's handle on a subject's unread feed. Dropping it releases the
/// poller once no other view holds one.
pub struct UnreadSubscription {
    subject: SubjectId,
    rx: watch::Receiver<UnreadSnapshot>,
    pollers: Arc<Mutex<HashMap<SubjectId, Poller>>>,
}

impl UnreadSubscription {
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn current(&self) -> UnreadSnapshot {
        *self.rx.borrow()
    }

    /// Wait for the next published snapshot. `None` if the poller is gone.
    pub async fn changed(&mut self) -> Option<UnreadSnapshot> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

impl Drop for UnreadSubscription {
    fn drop(&mut self) {
        let mut pollers = self.pollers.lock().unwrap_or_else(|e| e.into_inner());
        let Some(poller) = pollers.get_mut(&self.subject) else {
            return;
        };
        poller.subscribers = poller.subscribers.saturating_sub(1);
        if poller.subscribers == 0 {
            if let Some(poller) = pollers.remove(&self.subject) {
                poller.task.abort();
                info!(subject = %self.subject, "Unread poller stopped");
            }
        }
    }
}

async fn poll_loop(
    api: ApiClient,
    subject: SubjectId,
    interval: Duration,
    tx: watch::Sender<UnreadSnapshot>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick = 0u64;

    loop {
        ticker.tick().await;
        match api.unread_count(&subject).await {
            Ok(count) => {
                tick += 1;
                debug!(subject = %subject, count, tick, "Unread count polled");
                tx.send_replace(UnreadSnapshot { count, tick });
            }
            Err(e) => {
                warn!(subject = %subject, error = %e, "Unread poll failed");
            }
        }
    }
}
