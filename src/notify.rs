// File: ./src/notify.rs
//! Sinks for the short messages shown when a task cannot be rescheduled.
use notify_rust::Notification;
use std::sync::Mutex;

pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}

impl<N: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<N> {
    fn notify(&self, message: &str) {
        (**self).notify(message)
    }
}

/// Writes messages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Shows an OS notification and logs the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    fn notify(&self, message: &str) {
        log::warn!("{}", message);
        let body = message.to_string();
        // D-Bus round trips can block; keep them off the caller's thread.
        std::thread::spawn(move || {
            if let Err(e) = Notification::new()
                .summary("Recur")
                .body(&body)
                .appname("recur")
                .show()
            {
                log::debug!("Desktop notification failed: {}", e);
            }
        });
    }
}

/// Keeps every message in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, message: &str) {
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        messages.push(message.to_string());
    }
}

/// Picks the sink the configuration asks for.
pub fn sink_for(desktop: bool) -> Box<dyn NotificationSink> {
    if desktop {
        Box::new(DesktopSink)
    } else {
        Box::new(LogSink)
    }
}

impl NotificationSink for Box<dyn NotificationSink> {
    fn notify(&self, message: &str) {
        (**self).notify(message)
    }
}
