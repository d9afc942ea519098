use async_trait::async_trait;
use common::error::Res;
use uuid::Uuid;

use crate::domain::SubscriptionSnapshot;

#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    /// `Ok(None)` when no subscription has this id.
    async fn get_with_owner(&self, id: Uuid) -> Res<Option<SubscriptionSnapshot>>;
}
