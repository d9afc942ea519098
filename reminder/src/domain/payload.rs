use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::{ReminderCheckpoint, SubscriptionSnapshot};

/// Structured notification handed to the sender; rendering belongs to the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub to: String,
    pub owner_name: String,
    pub subscription_name: String,
    pub renewal_date: DateTime<Utc>,
    /// `MMM D, YYYY` in the reminder time zone.
    pub formatted_renewal_date: String,
    /// `<currency> <price> (<frequency>)`.
    pub price: String,
    pub payment_method: String,
    pub days_left: u32,
    /// Checkpoint label, also used as the delivery idempotency key.
    pub label: String,
}

impl ReminderPayload {
    pub fn new(
        subscription: &SubscriptionSnapshot,
        checkpoint: &ReminderCheckpoint,
        tz: FixedOffset,
    ) -> Self {
        let plan = &subscription.plan;
        ReminderPayload {
            to: subscription.owner.email.trim().to_string(),
            owner_name: subscription.owner.name.clone(),
            subscription_name: plan.name.clone(),
            renewal_date: subscription.renewal_date,
            formatted_renewal_date: subscription
                .renewal_date
                .with_timezone(&tz)
                .format("%b %-d, %Y")
                .to_string(),
            price: format!("{} {} ({})", plan.currency, plan.price, plan.frequency),
            payment_method: plan.payment_method.clone(),
            days_left: checkpoint.offset_days,
            label: checkpoint.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Owner, Plan};
    use chrono::TimeZone;
    use common::misc::SubscriptionStatus;
    use uuid::Uuid;

    #[test]
    fn payload_formats_date_and_price() {
        let id = Uuid::new_v4();
        let renewal = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let subscription = SubscriptionSnapshot {
            id,
            status: SubscriptionStatus::Active,
            renewal_date: renewal,
            owner: Owner {
                name: "Ada".to_string(),
                email: " ada@example.com ".to_string(),
            },
            plan: Plan {
                name: "Spotify".to_string(),
                price: 9.99,
                currency: "EUR".to_string(),
                frequency: "monthly".to_string(),
                payment_method: "Visa".to_string(),
            },
        };
        let checkpoint = ReminderCheckpoint::new(id, renewal, 2);

        let payload =
            ReminderPayload::new(&subscription, &checkpoint, FixedOffset::east_opt(0).unwrap());

        assert_eq!(payload.to, "ada@example.com");
        assert_eq!(payload.formatted_renewal_date, "Mar 4, 2026");
        assert_eq!(payload.price, "EUR 9.99 (monthly)");
        assert_eq!(payload.days_left, 2);
        assert_eq!(payload.label, checkpoint.label());
    }
}
