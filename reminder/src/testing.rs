//! Test doubles shared by the workflow tests.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{
    error::{AppError, Res},
    misc::SubscriptionStatus,
};
use uuid::Uuid;

use crate::{
    domain::{Owner, Plan, ReminderPayload, SubscriptionSnapshot},
    ports::{NotificationSender, SubscriptionLookup},
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
}

pub fn snapshot(renewal_in: Duration, status: SubscriptionStatus, email: &str) -> SubscriptionSnapshot {
    SubscriptionSnapshot {
        id: Uuid::new_v4(),
        status,
        renewal_date: t0() + renewal_in,
        owner: Owner {
            name: "Ada".to_string(),
            email: email.to_string(),
        },
        plan: Plan {
            name: "Netflix".to_string(),
            price: 15.49,
            currency: "USD".to_string(),
            frequency: "monthly".to_string(),
            payment_method: "Credit Card".to_string(),
        },
    }
}

pub struct StubLookup(pub Option<SubscriptionSnapshot>);

#[async_trait]
impl SubscriptionLookup for StubLookup {
    async fn get_with_owner(&self, _id: Uuid) -> Res<Option<SubscriptionSnapshot>> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct UnavailableLookup {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SubscriptionLookup for UnavailableLookup {
    async fn get_with_owner(&self, _id: Uuid) -> Res<Option<SubscriptionSnapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Internal("database unavailable".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<ReminderPayload>>,
}

impl RecordingSender {
    pub fn labels(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|p| p.label.clone()).collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, payload: &ReminderPayload) -> Res<()> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Fails the first `failures` sends.
pub struct FlakySender {
    failures: usize,
    pub calls: AtomicUsize,
}

impl FlakySender {
    pub fn new(failures: usize) -> Self {
        FlakySender {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NotificationSender for FlakySender {
    async fn send(&self, _payload: &ReminderPayload) -> Res<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            Err(AppError::Internal("mail API unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}
