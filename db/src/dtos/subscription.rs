use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug)]
pub struct SubscriptionInsert {
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
}

/// Fully resolved column values written by an update.
#[derive(Debug)]
pub struct SubscriptionChanges {
    pub name: String,
    pub price: f64,
    pub frequency: String,
    pub category: String,
    pub payment_method: String,
}
