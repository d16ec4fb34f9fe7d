//! §4.6 step 4: notify on a successfully written dump.
//!
//! Grounded in `doscrawler/slacks/models.py::Slack`. The Slack backend itself is out of
//! scope; the logging backend below is the only implementation this build ships, but the
//! trait is the seam a Slack (or any other) backend would plug into.

use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationStatus {
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub status: NotificationStatus,
    pub title: String,
    pub descriptions: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// The default backend: a plain `log::info!`/`log::error!` call. Matches the shape of
/// `Slack::text` without the Slack client itself.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notification: Notification) {
        let body = notification.descriptions.join(", ");
        match notification.status {
            NotificationStatus::Success => {
                log::info!("{}: {body}", notification.title);
            }
            NotificationStatus::Error => {
                log::error!("{}: {body}", notification.title);
            }
        }
    }
}
