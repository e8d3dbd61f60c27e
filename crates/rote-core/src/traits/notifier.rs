//! Notifier trait for fire-and-forget delivery to the learner's client.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::RoteResult;
use crate::types::Notification;

/// Delivers renderable messages to a learner's client.
///
/// Delivery failures are logged by the caller and never escalate into
/// scheduling failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to the learner.
    async fn notify(&self, learner_id: Uuid, message: Notification) -> RoteResult<()>;
}

/// Notifier that writes messages to the log. Useful as a default and in
/// tests.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, learner_id: Uuid, message: Notification) -> RoteResult<()> {
        info!(%learner_id, ?message, "notification");
        Ok(())
    }
}
