use async_trait::async_trait;
use uuid::Uuid;

use herald_core::ports::{NotificationKind, Notifier, NotifyError};

/// Writes notifications to the trace log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn trigger(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(user_id = %user_id, kind = %kind, payload = %payload, "Notification");
        Ok(())
    }
}
