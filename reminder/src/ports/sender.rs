use async_trait::async_trait;
use common::error::Res;

use crate::domain::ReminderPayload;

/// Delivers one reminder. Implementations should treat `payload.label`
/// as an idempotency key.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, payload: &ReminderPayload) -> Res<()>;
}
