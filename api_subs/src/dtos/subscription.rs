use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use common::{
    error::{AppError, Res},
    misc::{Category, Currency, Frequency, SubscriptionStatus},
};
use db::{
    dtos::subscription::{SubscriptionChanges, SubscriptionInsert},
    models::subscription::Subscription,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub frequency: String,
    pub category: String,
    pub payment_method: String,
    #[serde(default)]
    pub status: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub renewal_date: Option<DateTime<Utc>>,
}

/// Every field is optional; missing ones keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub frequency: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
}

impl CreateSubscriptionRequest {
    /// Validates the request and resolves defaults for `user_id` at `now`.
    ///
    /// A missing renewal date is derived from the start date and frequency.
    /// A renewal date already in the past stores the subscription as expired.
    pub fn into_insert(self, user_id: Uuid, now: DateTime<Utc>) -> Res<SubscriptionInsert> {
        let name = validate_name(&self.name)?;
        let price = validate_price(self.price)?;
        let currency = match self.currency.as_deref() {
            Some(raw) => parse_field::<Currency>(raw)?,
            None => Currency::Usd,
        };
        let frequency = parse_field::<Frequency>(&self.frequency)?;
        let category = parse_field::<Category>(&self.category)?;
        let payment_method = validate_payment_method(&self.payment_method)?;
        let mut status = match self.status.as_deref() {
            Some(raw) => parse_field::<SubscriptionStatus>(raw)?,
            None => SubscriptionStatus::Active,
        };

        if self.start_date > now {
            return Err(AppError::BadRequest(
                "Start date must be in the past".to_string(),
            ));
        }

        let renewal_date = match self.renewal_date {
            Some(renewal_date) if renewal_date <= self.start_date => {
                return Err(AppError::BadRequest(
                    "Renewal date must be after the start date".to_string(),
                ));
            }
            Some(renewal_date) => renewal_date,
            None => self.start_date + Duration::days(frequency.period_days()),
        };

        if renewal_date < now {
            status = SubscriptionStatus::Expired;
        }

        Ok(SubscriptionInsert {
            user_id,
            name,
            price,
            currency: currency.to_string(),
            frequency: frequency.to_string(),
            category: category.to_string(),
            payment_method,
            status: status.to_string(),
            start_date: self.start_date,
            renewal_date,
        })
    }
}

impl UpdateSubscriptionRequest {
    /// Merges the request over `existing` and validates the result.
    pub fn merge(self, existing: &Subscription) -> Res<SubscriptionChanges> {
        let name = validate_name(self.name.as_deref().unwrap_or(&existing.name))?;
        let price = validate_price(self.price.unwrap_or(existing.price))?;
        let frequency =
            parse_field::<Frequency>(self.frequency.as_deref().unwrap_or(&existing.frequency))?;
        let category =
            parse_field::<Category>(self.category.as_deref().unwrap_or(&existing.category))?;
        let payment_method = validate_payment_method(
            self.payment_method
                .as_deref()
                .unwrap_or(&existing.payment_method),
        )?;

        Ok(SubscriptionChanges {
            name,
            price,
            frequency: frequency.to_string(),
            category: category.to_string(),
            payment_method,
        })
    }
}

fn validate_name(raw: &str) -> Res<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err(AppError::BadRequest(
            "Subscription name must be between 2 and 100 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_price(price: f64) -> Res<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::BadRequest(
            "Price must be greater than or equal to 0".to_string(),
        ));
    }
    Ok(price)
}

fn validate_payment_method(raw: &str) -> Res<String> {
    let method = raw.trim();
    if method.is_empty() {
        return Err(AppError::BadRequest(
            "Payment method is required".to_string(),
        ));
    }
    Ok(method.to_string())
}

fn parse_field<T: FromStr<Err = String>>(raw: &str) -> Res<T> {
    raw.trim().parse::<T>().map_err(AppError::BadRequest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    fn request() -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            name: "  Netflix Premium ".to_string(),
            price: 15.99,
            currency: None,
            frequency: "monthly".to_string(),
            category: "entertainment".to_string(),
            payment_method: "Credit Card".to_string(),
            status: None,
            start_date: now() - Duration::days(10),
            renewal_date: None,
        }
    }

    fn stored() -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Spotify".to_string(),
            price: 9.99,
            currency: "EUR".to_string(),
            frequency: "monthly".to_string(),
            category: "entertainment".to_string(),
            payment_method: "PayPal".to_string(),
            status: "active".to_string(),
            start_date: now() - Duration::days(40),
            renewal_date: now() + Duration::days(20),
            created_at: now() - Duration::days(40),
            updated_at: now() - Duration::days(40),
        }
    }

    fn bad_request(res: Res<impl std::fmt::Debug>) -> String {
        match res {
            Err(AppError::BadRequest(message)) => message,
            other => panic!("expected bad request, got {:?}", other),
        }
    }

    #[test]
    fn defaults_are_filled_in() {
        let user_id = Uuid::new_v4();
        let insert = request().into_insert(user_id, now()).unwrap();

        assert_eq!(insert.user_id, user_id);
        assert_eq!(insert.name, "Netflix Premium");
        assert_eq!(insert.currency, "USD");
        assert_eq!(insert.status, "active");
        assert_eq!(insert.renewal_date, now() + Duration::days(20));
    }

    #[rstest]
    #[case("daily", 1)]
    #[case("weekly", 7)]
    #[case("monthly", 30)]
    #[case("yearly", 365)]
    fn renewal_date_follows_frequency(#[case] frequency: &str, #[case] days: i64) {
        let req = CreateSubscriptionRequest {
            frequency: frequency.to_string(),
            start_date: now(),
            ..request()
        };
        let insert = req.into_insert(Uuid::new_v4(), now()).unwrap();
        assert_eq!(insert.renewal_date, now() + Duration::days(days));
    }

    #[test]
    fn past_renewal_marks_expired() {
        let req = CreateSubscriptionRequest {
            start_date: now() - Duration::days(60),
            ..request()
        };
        let insert = req.into_insert(Uuid::new_v4(), now()).unwrap();
        assert_eq!(insert.status, "expired");
    }

    #[test]
    fn explicit_renewal_must_follow_start() {
        let req = CreateSubscriptionRequest {
            renewal_date: Some(now() - Duration::days(10)),
            ..request()
        };
        let message = bad_request(req.into_insert(Uuid::new_v4(), now()));
        assert!(message.contains("after the start date"));
    }

    #[test]
    fn future_start_is_rejected() {
        let req = CreateSubscriptionRequest {
            start_date: now() + Duration::days(1),
            ..request()
        };
        let message = bad_request(req.into_insert(Uuid::new_v4(), now()));
        assert!(message.contains("Start date"));
    }

    #[rstest]
    #[case::short_name(CreateSubscriptionRequest { name: " A ".to_string(), ..request() })]
    #[case::long_name(CreateSubscriptionRequest { name: "x".repeat(101), ..request() })]
    #[case::negative_price(CreateSubscriptionRequest { price: -1.0, ..request() })]
    #[case::nan_price(CreateSubscriptionRequest { price: f64::NAN, ..request() })]
    #[case::currency(CreateSubscriptionRequest { currency: Some("JPY".to_string()), ..request() })]
    #[case::frequency(CreateSubscriptionRequest { frequency: "hourly".to_string(), ..request() })]
    #[case::category(CreateSubscriptionRequest { category: "games".to_string(), ..request() })]
    #[case::payment(CreateSubscriptionRequest { payment_method: "  ".to_string(), ..request() })]
    #[case::status(CreateSubscriptionRequest { status: Some("paused".to_string()), ..request() })]
    fn invalid_fields_are_rejected(#[case] req: CreateSubscriptionRequest) {
        bad_request(req.into_insert(Uuid::new_v4(), now()));
    }

    #[test]
    fn update_keeps_missing_fields() {
        let update = UpdateSubscriptionRequest {
            price: Some(11.49),
            ..Default::default()
        };
        let changes = update.merge(&stored()).unwrap();

        assert_eq!(changes.name, "Spotify");
        assert_eq!(changes.price, 11.49);
        assert_eq!(changes.frequency, "monthly");
        assert_eq!(changes.payment_method, "PayPal");
    }

    #[test]
    fn update_is_revalidated() {
        let update = UpdateSubscriptionRequest {
            frequency: Some("fortnightly".to_string()),
            ..Default::default()
        };
        let message = bad_request(update.merge(&stored()));
        assert!(message.contains("daily, weekly, monthly, yearly"));
    }
}
