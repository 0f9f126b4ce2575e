//! Notification sinks.

mod logger;
mod webhook;

pub use logger::LogNotifier;
pub use webhook::{WebhookNotifier, WebhookNotifierConfig};
