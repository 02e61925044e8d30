//! Notification queue implementation

use super::clock::{Clock, SystemClock};
use super::types::{
    Notification, NotificationId, NotificationKind, PositionedNotification, QueueEvent,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How long a notification stays visible
pub const DEFAULT_TTL: Duration = Duration::from_millis(3000);

struct Entry {
    notification: Notification,
    expires_at: i64,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    /// (deadline ms, id), ordered by deadline
    timers: BTreeSet<(i64, NotificationId)>,
    last_id: NotificationId,
}

/// Ordered, self-expiring queue of notifications
///
/// Any collaborator may post; every mutation goes through one internal lock,
/// so concurrent expiries and posts are serialized.
pub struct NotificationQueue {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    inner: Mutex<Inner>,
    wake: Notify,
    events: broadcast::Sender<QueueEvent>,
}

impl NotificationQueue {
    /// Queue on the system clock with the default time-to-live
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), DEFAULT_TTL)
    }

    /// Queue on a custom clock and time-to-live
    pub fn with_clock(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            clock,
            ttl,
            inner: Mutex::new(Inner::default()),
            wake: Notify::new(),
            events,
        }
    }

    /// Time-to-live applied to new notifications
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Subscribe to queue changes
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    /// Append a notification and schedule its removal
    pub fn post(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        description: Option<String>,
    ) -> NotificationId {
        let created_at = self.clock.now();
        let now_ms = created_at.timestamp_millis();

        let id = {
            let mut inner = self.lock();
            let id = (now_ms.max(0) as u64).max(inner.last_id + 1);
            inner.last_id = id;

            let expires_at = now_ms.saturating_add(self.ttl.as_millis() as i64);
            inner.timers.insert((expires_at, id));
            inner.entries.push(Entry {
                notification: Notification {
                    id,
                    kind,
                    title: title.into(),
                    description,
                    created_at,
                },
                expires_at,
            });
            id
        };

        debug!(id, ?kind, "Notification posted");
        self.wake.notify_one();
        let _ = self.events.send(QueueEvent::Posted(id));
        id
    }

    /// Shorthand for an error notification
    pub fn error(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> NotificationId {
        self.post(NotificationKind::Error, title, Some(description.into()))
    }

    /// Shorthand for a success notification
    pub fn success(&self, title: impl Into<String>) -> NotificationId {
        self.post(NotificationKind::Success, title, None)
    }

    /// Remove a notification now and cancel its timer
    ///
    /// Returns whether anything was removed; unknown ids are ignored.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let removed = {
            let mut inner = self.lock();
            match inner.entries.iter().position(|e| e.notification.id == id) {
                Some(pos) => {
                    let entry = inner.entries.remove(pos);
                    inner.timers.remove(&(entry.expires_at, id));
                    true
                }
                None => false,
            }
        };

        if removed {
            self.wake.notify_one();
            let _ = self.events.send(QueueEvent::Dismissed(id));
        }
        removed
    }

    /// Remove everything
    pub fn clear(&self) {
        {
            let mut inner = self.lock();
            inner.entries.clear();
            inner.timers.clear();
        }
        self.wake.notify_one();
        let _ = self.events.send(QueueEvent::Cleared);
    }

    /// Remove every notification whose deadline has passed
    pub fn expire_due(&self) -> Vec<NotificationId> {
        let now = self.now_ms();
        let expired: Vec<NotificationId> = {
            let mut inner = self.lock();
            let mut expired = Vec::new();
            while let Some(&(deadline, id)) = inner.timers.first() {
                if deadline > now {
                    break;
                }
                inner.timers.pop_first();
                expired.push(id);
            }
            if !expired.is_empty() {
                inner.entries.retain(|e| !expired.contains(&e.notification.id));
            }
            expired
        };

        if !expired.is_empty() {
            debug!(count = expired.len(), "Notifications expired");
            let _ = self.events.send(QueueEvent::Expired(expired.clone()));
        }
        expired
    }

    /// Live notifications with their stacking position, oldest first
    pub fn list(&self) -> Vec<PositionedNotification> {
        self.expire_due();
        self.lock()
            .entries
            .iter()
            .enumerate()
            .map(|(position, e)| PositionedNotification {
                position,
                notification: e.notification.clone(),
            })
            .collect()
    }

    /// Look up one live notification
    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.expire_due();
        self.lock()
            .entries
            .iter()
            .find(|e| e.notification.id == id)
            .map(|e| e.notification.clone())
    }

    /// Number of stored notifications, without purging
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether nothing is stored, without purging
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scheduled expiry timers
    pub fn pending_timers(&self) -> usize {
        self.lock().timers.len()
    }

    /// Earliest scheduled expiry
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        let (deadline, _) = *self.lock().timers.first()?;
        DateTime::from_timestamp_millis(deadline)
    }

    /// Run expiry in the background until `shutdown` fires
    ///
    /// The task sleeps until the next deadline and is woken early whenever a
    /// post or dismiss changes the schedule.
    pub fn spawn_reaper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let wait = queue.next_deadline().map(|deadline| {
                    (deadline - queue.clock.now())
                        .to_std()
                        .unwrap_or(Duration::ZERO)
                });

                match wait {
                    Some(wait) => {
                        tokio::select! {
                            () = shutdown.cancelled() => break,
                            () = tokio::time::sleep(wait) => {}
                            () = queue.wake.notified() => {}
                        }
                    }
                    None => {
                        tokio::select! {
                            () = shutdown.cancelled() => break,
                            () = queue.wake.notified() => {}
                        }
                    }
                }

                queue.expire_due();
            }
            debug!("Notification reaper stopped");
        })
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
