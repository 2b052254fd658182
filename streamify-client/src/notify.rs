use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A transient, user-visible message (a toast).
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Error, message: message.into() }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, message: &str) {
        self.notify(Notification::success(message));
    }

    fn error(&self, message: &str) {
        self.notify(Notification::error(message));
    }
}

/// Writes notifications to the log only.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => info!(message = %notification.message, "notification"),
            NotificationKind::Error => warn!(message = %notification.message, "notification"),
        }
    }
}

/// Queues notifications for a UI to pick up and render.
#[derive(Clone, Debug, Default)]
pub struct NotificationQueue {
    queue: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Notifier for NotificationQueue {
    fn notify(&self, notification: Notification) {
        LogNotifier.notify(notification.clone());
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push(notification);
    }
}
