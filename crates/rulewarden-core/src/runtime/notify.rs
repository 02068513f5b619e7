// crates/rulewarden-core/src/runtime/notify.rs
// ============================================================================
// Module: Rulewarden Notifier Implementations
// Description: Reference notifier sinks for hosts and tests.
// Purpose: Provide a silent default and a channel-backed test sink.
// Dependencies: crate::interfaces, std
// ============================================================================

//! ## Overview
//! Production hosts plug their mail gateway in behind [`Notifier`]; these
//! reference implementations cover hosts that disable mail entirely and
//! tests that assert on delivered notifications.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use crate::interfaces::Notifier;
use crate::interfaces::NotifyError;

// ============================================================================
// SECTION: Noop Notifier
// ============================================================================

/// Notifier that silently drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _subject: &str, _body: &str, _recipients: &[String]) -> Result<(), NotifyError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Channel Notifier
// ============================================================================

/// Delivered notification captured by [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    /// Notification subject.
    pub subject: String,
    /// Notification body.
    pub body: String,
    /// Recipient list.
    pub recipients: Vec<String>,
}

/// Notifier that records notifications for test assertions.
#[derive(Debug, Default, Clone)]
pub struct ChannelNotifier {
    /// Captured notifications.
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl ChannelNotifier {
    /// Creates an empty channel notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the notifications delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), NotifyError> {
        let mut guard = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Delivery("notifier mutex poisoned".to_string()))?;
        guard.push(SentNotification {
            subject: subject.to_string(),
            body: body.to_string(),
            recipients: recipients.to_vec(),
        });
        Ok(())
    }
}
