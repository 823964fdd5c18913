//! Best-effort user notifications.
//!
//! Dispatched after the authoritative mutation commits; a failure here is
//! logged and swallowed, never rolled back into the ledger.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &UserId, notification: Notification)
    -> Result<(), NotifyError>;
}

/// Logs notifications instead of delivering them. Default for deployments
/// where delivery is handled by an external channel.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        notification: Notification,
    ) -> Result<(), NotifyError> {
        tracing::info!(user = %user_id, title = %notification.title, "User notification");
        Ok(())
    }
}

/// Records notifications in memory. Test double.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, Notification)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(UserId, Notification)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        notification: Notification,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .await
            .push((user_id.clone(), notification));
        Ok(())
    }
}
