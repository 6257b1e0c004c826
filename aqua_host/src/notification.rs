//! Notification queue for plugin and host feedback.
//!
//! Provides transient notifications for operations like open, save and
//! plugin messages. Rendering (colors, placement, fade) belongs to the
//! front-end; the host only tracks messages and their lifetimes.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Notifications kept before the oldest are dropped.
const MAX_PENDING: usize = 32;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational message.
    Info,
    /// A completed operation.
    Success,
    /// Something degraded but recoverable.
    Warning,
    /// A failed operation.
    Error,
}

/// A single notification.
#[derive(Debug, Clone)]
pub struct Notification {
    /// The notification message.
    pub message: String,
    /// Severity of the notification.
    pub severity: Severity,
    /// When the notification was created.
    pub created_at: Instant,
    /// How long the notification should be visible.
    pub duration: Duration,
}

impl Notification {
    /// Creates a notification visible for the default three seconds.
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            created_at: Instant::now(),
            duration: Duration::from_secs(3),
        }
    }

    /// Overrides the visibility duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Returns whether this notification has expired.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.duration
    }
}

/// Ordered queue of live notifications.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: VecDeque<Notification>,
}

impl NotificationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a notification, dropping the oldest past the queue limit.
    pub fn push(&mut self, notification: Notification) {
        self.pending.push_back(notification);
        while self.pending.len() > MAX_PENDING {
            self.pending.pop_front();
        }
    }

    /// Removes expired notifications. Call once per frame.
    pub fn prune(&mut self) {
        self.pending.retain(|n| !n.is_expired());
    }

    /// Live notifications, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.pending.iter()
    }

    /// Number of live notifications.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
