//! Dump Writer (§4.6): cron-driven sweep that retires expired attacks into compressed JSON
//! artifacts and notifies on success.

pub mod cron;
pub mod error;
pub mod notify;
pub mod sweep;

pub use cron::next_fire_after;
pub use error::DumpWriterError;
pub use notify::{LoggingNotifier, Notification, NotificationStatus, Notifier};
pub use sweep::{DumpCounts, DumpWriter};
