use chrono::{DateTime, Duration, FixedOffset, Utc};
use uuid::Uuid;

/// One scheduled reminder instant: `offset_days` before the renewal date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCheckpoint {
    pub subscription_id: Uuid,
    pub offset_days: u32,
    pub at: DateTime<Utc>,
}

impl ReminderCheckpoint {
    pub fn new(subscription_id: Uuid, renewal_date: DateTime<Utc>, offset_days: u32) -> Self {
        ReminderCheckpoint {
            subscription_id,
            offset_days,
            at: renewal_date - Duration::days(i64::from(offset_days)),
        }
    }

    /// Deterministic step label, stable across replays.
    pub fn label(&self) -> String {
        format!("Reminder-{}-{}", self.subscription_id, self.offset_days)
    }
}

/// Checkpoints in the order of `offsets`.
pub fn checkpoints(
    subscription_id: Uuid,
    renewal_date: DateTime<Utc>,
    offsets: &[u32],
) -> Vec<ReminderCheckpoint> {
    offsets
        .iter()
        .map(|offset| ReminderCheckpoint::new(subscription_id, renewal_date, *offset))
        .collect()
}

pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: FixedOffset) -> bool {
    a.with_timezone(&tz).date_naive() == b.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn checkpoint_times_are_offsets_before_renewal() {
        let id = Uuid::new_v4();
        let renewal = Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap();

        let cps = checkpoints(id, renewal, &[7, 5, 2, 1]);

        let days: Vec<u32> = cps.iter().map(|c| c.offset_days).collect();
        assert_eq!(days, vec![7, 5, 2, 1]);
        assert_eq!(cps[0].at, Utc.with_ymd_and_hms(2026, 3, 3, 9, 30, 0).unwrap());
        assert_eq!(cps[3].at, Utc.with_ymd_and_hms(2026, 3, 9, 9, 30, 0).unwrap());
    }

    #[test]
    fn label_combines_subscription_and_offset() {
        let id = Uuid::parse_str("6f1c8e3a-3b0c-4a4e-9a51-0d4c1f1d2e3f").unwrap();
        let cp = ReminderCheckpoint::new(id, Utc::now(), 5);
        assert_eq!(cp.label(), "Reminder-6f1c8e3a-3b0c-4a4e-9a51-0d4c1f1d2e3f-5");
    }

    #[test]
    fn calendar_day_depends_on_time_zone() {
        let late = Utc.with_ymd_and_hms(2026, 3, 3, 23, 0, 0).unwrap();
        let next_morning = Utc.with_ymd_and_hms(2026, 3, 4, 1, 0, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();

        assert!(!same_calendar_day(late, next_morning, utc));
        assert!(same_calendar_day(late, next_morning, new_york));
    }
}
