use chrono::{DateTime, Utc};
use common::misc::SubscriptionStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the scheduler needs to know about a subscription, read once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub id: Uuid,
    pub status: SubscriptionStatus,
    pub renewal_date: DateTime<Utc>,
    pub owner: Owner,
    pub plan: Plan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    pub email: String,
}

/// Passed through verbatim to the notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub frequency: String,
    pub payment_method: String,
}
