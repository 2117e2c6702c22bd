use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::events::Outbound;

pub const GOING_TO_BED: &str = "Going to Bed";

/// A user-visible notification. `actions` are button labels; answers come back as inbound
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

impl Notification {
    pub fn new(title: &str, message: &str, actions: &[&str]) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            actions: actions.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Spontaneous reminder raised by the late-night policy.
    pub fn sleep_reminder() -> Self {
        Self::new(
            "SleepGuard - Time for Bed?",
            "You've been active for a while. Consider winding down for better sleep quality.",
            &[GOING_TO_BED, "5 More Minutes"],
        )
    }

    pub fn snooze_expired() -> Self {
        Self::new(
            "SleepGuard - Reminder",
            "Your snooze time is up. Time to consider going to bed?",
            &[GOING_TO_BED, "Snooze Again"],
        )
    }

    pub fn bedtime() -> Self {
        Self::new(
            "SleepGuard - Bedtime",
            "It's your bedtime. Time to put the screen away.",
            &[GOING_TO_BED, "Snooze"],
        )
    }

    pub fn good_night() -> Self {
        Self::new("SleepGuard", "Good night! Sleep well! 🌙", &[])
    }
}

/// Notification delivery. Fire-and-forget: there is no result and nothing is retried.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    fn deliver(&self, notification: Notification);
}

/// Hands notifications to the outbound writer of the daemon.
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn deliver(&self, notification: Notification) {
        info!("Delivering notification {:?}", notification.title);
        if let Err(e) = self.sender.send(Outbound::Notification(notification)) {
            warn!("Notification dropped, outbound channel is closed: {e}");
        }
    }
}
