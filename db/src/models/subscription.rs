use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub frequency: String,
    pub category: String,
    pub payment_method: String,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub renewal_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription joined with the owner's name and e-mail.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionWithOwner {
    #[sqlx(flatten)]
    pub subscription: Subscription,
    pub owner_name: String,
    pub owner_email: String,
}
